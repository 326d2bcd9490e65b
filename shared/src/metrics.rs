use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct SyncMetrics {
    // Intents
    pub intents_enqueued: AtomicU64,

    // Reconciliation
    pub mutations_dispatched: AtomicU64,
    pub mutations_confirmed: AtomicU64,
    pub mutations_rejected: AtomicU64,
    pub compensations: AtomicU64,

    // Fetching
    pub loads_completed: AtomicU64,
    pub loads_failed: AtomicU64,
    pub refreshes_completed: AtomicU64,
    pub refreshes_skipped: AtomicU64,
    pub refreshes_failed: AtomicU64,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            intents_enqueued: self.intents_enqueued.load(Ordering::Relaxed),
            mutations_dispatched: self.mutations_dispatched.load(Ordering::Relaxed),
            mutations_confirmed: self.mutations_confirmed.load(Ordering::Relaxed),
            mutations_rejected: self.mutations_rejected.load(Ordering::Relaxed),
            compensations: self.compensations.load(Ordering::Relaxed),
            loads_completed: self.loads_completed.load(Ordering::Relaxed),
            loads_failed: self.loads_failed.load(Ordering::Relaxed),
            refreshes_completed: self.refreshes_completed.load(Ordering::Relaxed),
            refreshes_skipped: self.refreshes_skipped.load(Ordering::Relaxed),
            refreshes_failed: self.refreshes_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub intents_enqueued: u64,
    pub mutations_dispatched: u64,
    pub mutations_confirmed: u64,
    pub mutations_rejected: u64,
    pub compensations: u64,
    pub loads_completed: u64,
    pub loads_failed: u64,
    pub refreshes_completed: u64,
    pub refreshes_skipped: u64,
    pub refreshes_failed: u64,
}

impl MetricsSnapshot {
    /// Dispatched mutations that have not produced an outcome yet.
    pub fn mutations_outstanding(&self) -> u64 {
        self.mutations_dispatched
            .saturating_sub(self.mutations_confirmed + self.mutations_rejected)
    }
}
