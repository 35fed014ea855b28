//! The in-memory database and its committed state.

use crate::config::StoreConfig;
use crate::entity::{Entity, EntityId};
use crate::error::StoreResult;
use crate::record::Record;
use crate::stats::{DatabaseStats, StatsSnapshot};
use crate::transaction::MemoryTransaction;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use txscope_core::ResourceFactory;

/// A committed (or pending) record body.
#[derive(Debug, Clone)]
pub(crate) struct StoredRecord {
    pub(crate) payload: Vec<u8>,
    /// Creation order, used to return records in insertion order.
    pub(crate) created: u64,
}

/// Committed state shared by every resource of one database.
#[derive(Debug, Default)]
pub(crate) struct Committed {
    kinds: HashMap<String, HashMap<EntityId, StoredRecord>>,
    sequence: u64,
}

impl Committed {
    pub(crate) fn get(&self, kind: &str, id: EntityId) -> Option<&StoredRecord> {
        self.kinds.get(kind).and_then(|records| records.get(&id))
    }

    pub(crate) fn records<'a>(
        &'a self,
        kind: &str,
    ) -> impl Iterator<Item = (EntityId, &'a StoredRecord)> + 'a {
        self.kinds
            .get(kind)
            .into_iter()
            .flat_map(|records| records.iter().map(|(id, record)| (*id, record)))
    }

    /// Applies a batch of writes atomically and returns the new sequence.
    pub(crate) fn apply(
        &mut self,
        writes: impl IntoIterator<Item = ((String, EntityId), StoredRecord)>,
    ) -> u64 {
        for ((kind, id), record) in writes {
            self.kinds.entry(kind).or_default().insert(id, record);
        }
        self.sequence += 1;
        self.sequence
    }

    fn count(&self, kind: &str) -> usize {
        self.kinds.get(kind).map_or(0, HashMap::len)
    }
}

pub(crate) struct Shared {
    pub(crate) config: StoreConfig,
    pub(crate) committed: RwLock<Committed>,
    pub(crate) stats: DatabaseStats,
    next_serial: AtomicU64,
    next_created: AtomicU64,
}

impl Shared {
    pub(crate) fn next_created(&self) -> u64 {
        self.next_created.fetch_add(1, Ordering::Relaxed)
    }
}

/// In-memory database acting as the resource factory.
///
/// Every resource it creates is one [`MemoryTransaction`]. Work done through a
/// resource is buffered and becomes visible to other resources only when that
/// resource commits.
#[derive(Clone)]
pub struct MemoryDatabase {
    shared: Arc<Shared>,
}

impl MemoryDatabase {
    /// Creates an empty database with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates an empty database.
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                committed: RwLock::new(Committed::default()),
                stats: DatabaseStats::new(),
                next_serial: AtomicU64::new(1),
                next_created: AtomicU64::new(1),
            }),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    /// Returns a snapshot of the lifecycle counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Returns the committed records of `kind` in insertion order.
    ///
    /// Reads outside any transaction; used for inspection.
    #[must_use]
    pub fn committed(&self, kind: &str) -> Vec<Record> {
        let committed = self.shared.committed.read();
        let mut rows: Vec<_> = committed
            .records(kind)
            .map(|(id, stored)| {
                (
                    stored.created,
                    Record::new(kind, Some(id), stored.payload.clone()),
                )
            })
            .collect();
        rows.sort_by_key(|(created, _)| *created);
        rows.into_iter().map(|(_, record)| record).collect()
    }

    /// Returns the committed entities of type `E` in insertion order.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a stored payload does not decode as `E`.
    pub fn committed_entities<E: Entity>(&self) -> StoreResult<Vec<E>> {
        self.committed(E::KIND).iter().map(Record::decode).collect()
    }

    /// Returns the number of committed records of `kind`.
    #[must_use]
    pub fn committed_count(&self, kind: &str) -> usize {
        self.shared.committed.read().count(kind)
    }

    /// Returns the sequence number of the last commit (0 if none).
    #[must_use]
    pub fn committed_seq(&self) -> u64 {
        self.shared.committed.read().sequence
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceFactory for MemoryDatabase {
    type Resource = MemoryTransaction;

    fn create_resource(&self) -> MemoryTransaction {
        let serial = self.shared.next_serial.fetch_add(1, Ordering::Relaxed);
        self.shared.stats.record_resource_created();
        MemoryTransaction::new(Arc::clone(&self.shared), serial)
    }
}

impl fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDatabase")
            .field("committed_seq", &self.committed_seq())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
