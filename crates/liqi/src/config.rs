//! Export configuration.

use std::time::Duration;

/// Which game records the lobby lists.
///
/// Sent as the `type` field of the record list request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum RecordCategory {
    /// Every recorded game.
    #[default]
    All = 0,
    /// Games in friendly rooms.
    Friendly = 1,
    /// Ranked matchmaking games.
    Ranked = 2,
    /// Tournament games.
    Contest = 3,
    /// Games the account marked as favorites.
    Favorite = 4,
}

impl RecordCategory {
    /// The wire value of this category.
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Tuning for a record export run.
///
/// All fields have sensible defaults via [`Default`]. Override what you
/// need:
///
/// ```rust
/// use std::time::Duration;
/// use liqi::ExportConfig;
///
/// let config = ExportConfig {
///     max_records: Some(20),
///     call_timeout: Some(Duration::from_secs(10)),
///     ..ExportConfig::default()
/// };
/// assert_eq!(config.page_size, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Records requested per list page.
    ///
    /// Default: 10.
    pub page_size: u32,

    /// Which records to list.
    ///
    /// Default: [`RecordCategory::All`].
    pub record_category: RecordCategory,

    /// Stop after this many records. `None` exports everything the lobby
    /// lists.
    ///
    /// Default: `None`.
    pub max_records: Option<usize>,

    /// Upper bound on each lobby call. `None` waits indefinitely.
    ///
    /// Default: 30 seconds.
    pub call_timeout: Option<Duration>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            record_category: RecordCategory::All,
            max_records: None,
            call_timeout: Some(Duration::from_secs(30)),
        }
    }
}
