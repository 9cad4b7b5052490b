use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Running counters for one registry instance.
#[derive(Debug, Default)]
pub struct RegistryStats {
    registered: AtomicU64,
    ignored: AtomicU64,
    dispatched: AtomicU64,
    removed: AtomicU64,
    callback_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    pub registered: u64,
    pub ignored: u64,
    pub dispatched: u64,
    pub removed: u64,
    pub callback_errors: u64,
}

impl RegistryStats {
    pub fn record_registered(&self) {
        self.registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_removed(&self) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_callback_error(&self) {
        self.callback_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            registered: self.registered.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            callback_errors: self.callback_errors.load(Ordering::Relaxed),
        }
    }
}
