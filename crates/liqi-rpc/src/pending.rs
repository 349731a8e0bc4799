//! The pending call table: which correlation keys are waiting for a
//! response, and where to deliver it.
//!
//! `PendingTable` is not synchronized itself. It lives inside the
//! channel's state mutex, so every operation here runs inside one
//! critical section.

use std::collections::HashMap;
use std::time::Instant;

use liqi_protocol::Envelope;
use tokio::sync::oneshot;

use crate::ChannelError;

/// What a waiting call eventually receives.
pub(crate) type CallResult = Result<Envelope, ChannelError>;

/// One outstanding call.
#[derive(Debug)]
pub(crate) struct PendingCall {
    /// Method the call was issued for, for diagnostics.
    pub(crate) method: String,
    /// Single-shot slot the response is delivered into.
    pub(crate) waiter: oneshot::Sender<CallResult>,
    /// When the call was issued.
    pub(crate) issued_at: Instant,
}

impl PendingCall {
    pub(crate) fn new(
        method: impl Into<String>,
        waiter: oneshot::Sender<CallResult>,
    ) -> Self {
        Self {
            method: method.into(),
            waiter,
            issued_at: Instant::now(),
        }
    }

    /// Delivers `result` to the caller. A caller that stopped waiting
    /// (e.g. timed out) has dropped its receiver; that is not an error.
    pub(crate) fn deliver(self, result: CallResult) -> bool {
        self.waiter.send(result).is_ok()
    }
}

/// Correlation key → outstanding call.
#[derive(Debug)]
pub(crate) struct PendingTable {
    calls: HashMap<u16, PendingCall>,
    /// Next key to try; keys are handed out round-robin so a key is not
    /// reused soon after it completes.
    next_key: u16,
    max_pending: usize,
}

impl PendingTable {
    pub(crate) fn new(max_pending: usize) -> Self {
        Self {
            calls: HashMap::new(),
            next_key: 1,
            max_pending: max_pending.clamp(1, usize::from(u16::MAX) + 1),
        }
    }

    /// Picks a key no outstanding call is using. Does not reserve it;
    /// the caller inserts under the same lock.
    ///
    /// # Errors
    /// [`ChannelError::TooManyPending`] when the table is full.
    pub(crate) fn allocate_key(&mut self) -> Result<u16, ChannelError> {
        if self.calls.len() >= self.max_pending {
            tracing::warn!(
                pending_len = self.calls.len(),
                max_pending = self.max_pending,
                "too many pending calls; refusing new call"
            );
            return Err(ChannelError::TooManyPending(self.calls.len()));
        }
        // At least one key is free, so this terminates within 2^16 steps.
        loop {
            let key = self.next_key;
            self.next_key = self.next_key.wrapping_add(1);
            if !self.calls.contains_key(&key) {
                return Ok(key);
            }
        }
    }

    /// Records a call under `key`, which must come from
    /// [`allocate_key`](Self::allocate_key).
    pub(crate) fn insert(&mut self, key: u16, call: PendingCall) {
        let previous = self.calls.insert(key, call);
        debug_assert!(previous.is_none(), "correlation key {key} reused");
        tracing::debug!(
            key,
            pending_len = self.calls.len(),
            "registered pending call"
        );
    }

    /// Removes and returns the call waiting on `key`.
    pub(crate) fn take(&mut self, key: u16) -> Option<PendingCall> {
        self.calls.remove(&key)
    }

    /// Removes every outstanding call.
    pub(crate) fn drain(&mut self) -> Vec<(u16, PendingCall)> {
        self.calls.drain().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.calls.len()
    }

    /// Sorted keys of the outstanding calls.
    pub(crate) fn keys(&self) -> Vec<u16> {
        let mut keys: Vec<u16> = self.calls.keys().copied().collect();
        keys.sort_unstable();
        keys
    }
}
