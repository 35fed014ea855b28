//! Lifecycle statistics.
//!
//! Counters are atomic and can be read while transactions are in progress.
//! Values are monotonically increasing, except the `open_resources` gauge.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle and unit-of-work counters for one database.
#[derive(Debug, Default)]
pub struct DatabaseStats {
    resources_created: AtomicU64,
    connects: AtomicU64,
    begins: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
    releases: AtomicU64,
    loads: AtomicU64,
    saves: AtomicU64,
    faults: AtomicU64,
}

impl DatabaseStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_resource_created(&self) {
        self.resources_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_begin(&self) {
        self.begins.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_save(&self) {
        self.saves.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let resources_created = self.resources_created.load(Ordering::Relaxed);
        let releases = self.releases.load(Ordering::Relaxed);
        StatsSnapshot {
            resources_created,
            connects: self.connects.load(Ordering::Relaxed),
            begins: self.begins.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            releases,
            loads: self.loads.load(Ordering::Relaxed),
            saves: self.saves.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            open_resources: resources_created.saturating_sub(releases),
        }
    }
}

/// Point-in-time copy of [`DatabaseStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Resources handed out by the factory.
    pub resources_created: u64,
    /// Successful connects.
    pub connects: u64,
    /// Transactions started.
    pub begins: u64,
    /// Transactions committed.
    pub commits: u64,
    /// Transactions rolled back.
    pub rollbacks: u64,
    /// Resources released.
    pub releases: u64,
    /// Load operations.
    pub loads: u64,
    /// Save operations.
    pub saves: u64,
    /// Injected faults triggered.
    pub faults: u64,
    /// Resources created but not yet released.
    pub open_resources: u64,
}
