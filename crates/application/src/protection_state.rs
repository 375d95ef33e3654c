use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

use bulwark_domain::remaining_until;

use crate::ScheduledTask;

/// Observable protection state of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProtectionState {
    /// Whether protected requests are currently refused.
    pub is_blocked: bool,
    /// Local expiry of the current block.
    pub blocked_until: Option<DateTime<Utc>>,
    /// Requests recorded during the last minute.
    pub request_count: usize,
    /// Whether the last evaluation crossed the suspicious threshold.
    pub warning: bool,
}

/// Shared handle over a session's [`ProtectionState`] and its unblock timer.
#[derive(Clone)]
pub struct ProtectionStateHandle {
    sender: Arc<watch::Sender<ProtectionState>>,
    unblock_task: Arc<Mutex<Option<ScheduledTask>>>,
}

impl ProtectionStateHandle {
    /// Creates an unblocked state.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(ProtectionState::default());
        Self {
            sender: Arc::new(sender),
            unblock_task: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn snapshot(&self) -> ProtectionState {
        self.sender.borrow().clone()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ProtectionState> {
        self.sender.subscribe()
    }

    /// Returns whether the session is blocked.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.sender.borrow().is_blocked
    }

    /// Marks the session blocked and arms the local unblock at `until`.
    ///
    /// Replaces any previously armed unblock.
    pub fn block_until(&self, until: DateTime<Utc>, now: DateTime<Utc>) {
        self.sender.send_modify(|state| {
            state.is_blocked = true;
            state.blocked_until = Some(until);
            state.warning = false;
        });

        let sender = self.sender.clone();
        let task = ScheduledTask::arm(remaining_until(until, now), move || async move {
            sender.send_modify(|state| {
                state.is_blocked = false;
                state.blocked_until = None;
            });
            info!(blocked_until = %until, "local block expired");
        });

        let previous = self
            .unblock_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        drop(previous);
    }

    /// Publishes the last-minute request count.
    pub fn set_request_count(&self, request_count: usize) {
        self.sender.send_if_modified(|state| {
            let changed = state.request_count != request_count;
            state.request_count = request_count;
            changed
        });
    }

    /// Publishes the warning flag.
    pub fn set_warning(&self, warning: bool) {
        self.sender.send_if_modified(|state| {
            let changed = state.warning != warning;
            state.warning = warning;
            changed
        });
    }

    /// Cancels the pending unblock timer, if any.
    pub fn cancel_timers(&self) {
        let pending = self
            .unblock_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(pending);
    }
}

impl Default for ProtectionStateHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::Duration;

    use crate::test_support::epoch;

    use super::ProtectionStateHandle;

    #[tokio::test(start_paused = true)]
    async fn block_lifts_when_timer_fires() {
        let state = ProtectionStateHandle::new();
        let now = epoch();
        state.block_until(now + Duration::minutes(2), now);
        assert!(state.is_blocked());

        tokio::time::sleep(StdDuration::from_secs(121)).await;

        let snapshot = state.snapshot();
        assert!(!snapshot.is_blocked);
        assert_eq!(snapshot.blocked_until, None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_keeps_block() {
        let state = ProtectionStateHandle::new();
        let now = epoch();
        state.block_until(now + Duration::minutes(1), now);
        state.cancel_timers();

        tokio::time::sleep(StdDuration::from_secs(120)).await;
        assert!(state.is_blocked());
    }

    #[tokio::test]
    async fn subscribers_see_request_count_changes() {
        let state = ProtectionStateHandle::new();
        let mut receiver = state.subscribe();

        state.set_request_count(7);

        assert!(receiver.has_changed().unwrap_or(false));
        assert_eq!(receiver.borrow_and_update().request_count, 7);
    }
}
