//! Channel configuration.

/// Limits for an [`RpcChannel`](crate::RpcChannel).
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Maximum number of calls awaiting a response at once. Capped at the
    /// size of the 16-bit correlation key space.
    ///
    /// Default: 4096.
    pub max_pending: usize,

    /// Notifications buffered for the notification receiver before new
    /// ones are dropped.
    ///
    /// Default: 64.
    pub notification_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_pending: 4096,
            notification_buffer: 64,
        }
    }
}
