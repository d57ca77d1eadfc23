//! Single-assignment completion signal shared by a subscriber's delivery
//! task and its supervising loop

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

/// Counts deliveries and latches the first and the target-count instants
///
/// Both instants are `OnceLock`s, so the first writer wins no matter how many
/// delivery callbacks race past the target.
#[derive(Debug)]
pub struct CompletionLatch {
    target: u64,
    received: AtomicU64,
    first_at: OnceLock<Instant>,
    completed_at: OnceLock<Instant>,
    notify: Notify,
}

impl CompletionLatch {
    /// Latch that completes after `target` deliveries
    pub fn new(target: u64) -> Self {
        Self {
            target,
            received: AtomicU64::new(0),
            first_at: OnceLock::new(),
            completed_at: OnceLock::new(),
            notify: Notify::new(),
        }
    }

    /// Record one delivery
    ///
    /// Returns `true` only for the call that completed the latch.
    pub fn record(&self) -> bool {
        let now = Instant::now();
        self.first_at.get_or_init(|| now);

        let received = self.received.fetch_add(1, Ordering::AcqRel) + 1;
        if received >= self.target && self.completed_at.set(now).is_ok() {
            self.notify.notify_one();
            return true;
        }
        false
    }

    /// Deliveries recorded so far
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Acquire)
    }

    /// Instant of the first delivery
    pub fn started_at(&self) -> Option<Instant> {
        self.first_at.get().copied()
    }

    /// Whether the target count was reached
    pub fn is_complete(&self) -> bool {
        self.completed_at.get().is_some()
    }

    /// Time from first delivery to completion, once complete
    pub fn duration(&self) -> Option<Duration> {
        let end = *self.completed_at.get()?;
        let start = self.started_at()?;
        Some(end.saturating_duration_since(start))
    }

    /// Time since the first delivery, if any arrived
    pub fn since_start(&self) -> Option<Duration> {
        self.started_at().map(|start| start.elapsed())
    }

    /// Wait until completion or for at most `max`, whichever comes first
    pub async fn wait(&self, max: Duration) {
        if self.is_complete() {
            return;
        }
        let _ = tokio::time::timeout(max, self.notify.notified()).await;
    }
}
