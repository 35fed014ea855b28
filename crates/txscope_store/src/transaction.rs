//! Transaction resource of the in-memory store.

use crate::database::{Shared, StoredRecord};
use crate::entity::EntityId;
use crate::error::{StoreError, StoreResult};
use crate::record::{Criteria, Record};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use txscope_core::{Operation, TransactionResource, TxResult, UnitOfWork};

/// Connection state of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created but not yet connected.
    Disconnected,
    /// Connected and usable.
    Connected,
    /// Returned to the database; unusable.
    Released,
}

/// Transaction state of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// No transaction started yet.
    NotStarted,
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    RolledBack,
}

#[derive(Debug)]
struct Inner {
    connection: ConnectionState,
    transaction: TransactionState,
    /// Pending writes: (kind, entity_id) -> record body.
    writes: HashMap<(String, EntityId), StoredRecord>,
}

/// One transaction against a [`crate::MemoryDatabase`].
///
/// Writes are buffered until commit, then applied atomically under the
/// database's write lock. Reads see committed state overlaid with this
/// resource's own pending writes.
pub struct MemoryTransaction {
    shared: Arc<Shared>,
    serial: u64,
    inner: Mutex<Inner>,
}

impl MemoryTransaction {
    pub(crate) fn new(shared: Arc<Shared>, serial: u64) -> Self {
        Self {
            shared,
            serial,
            inner: Mutex::new(Inner {
                connection: ConnectionState::Disconnected,
                transaction: TransactionState::NotStarted,
                writes: HashMap::new(),
            }),
        }
    }

    /// Returns the resource's serial number within its database.
    #[must_use]
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.lock().connection
    }

    /// Returns the current transaction state.
    #[must_use]
    pub fn transaction_state(&self) -> TransactionState {
        self.inner.lock().transaction
    }

    /// Returns the number of buffered writes.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.lock().writes.len()
    }

    /// Suspension point and fault injection shared by every operation.
    async fn enter(&self, operation: Operation) -> TxResult<()> {
        if self.shared.config.yield_on_io {
            tokio::task::yield_now().await;
        }
        if self.shared.config.faults.fails(operation) {
            self.shared.stats.record_fault();
            return Err(StoreError::InjectedFault(operation).into_tx(operation));
        }
        Ok(())
    }

    fn load_now(&self, kind: &str, criteria: &Criteria) -> StoreResult<Vec<Record>> {
        let inner = self.inner.lock();
        ensure_active(&inner, Operation::Load)?;

        let committed = self.shared.committed.read();
        let mut merged: HashMap<EntityId, &StoredRecord> = committed.records(kind).collect();
        for ((write_kind, id), stored) in &inner.writes {
            if write_kind == kind {
                merged.insert(*id, stored);
            }
        }

        let mut rows = Vec::with_capacity(merged.len());
        for (id, stored) in merged {
            let record = Record::new(kind, Some(id), stored.payload.clone());
            if criteria.matches(&record)? {
                rows.push((stored.created, record));
            }
        }
        rows.sort_by_key(|(created, _)| *created);
        Ok(rows.into_iter().map(|(_, record)| record).collect())
    }

    fn save_now(&self, record: Record) -> StoreResult<Record> {
        let mut inner = self.inner.lock();
        ensure_active(&inner, Operation::Save)?;

        let kind = record.kind().to_string();
        let (id, created) = match record.id() {
            Some(id) => {
                let existing = inner
                    .writes
                    .get(&(kind.clone(), id))
                    .map(|stored| stored.created)
                    .or_else(|| {
                        self.shared
                            .committed
                            .read()
                            .get(&kind, id)
                            .map(|stored| stored.created)
                    });
                (id, existing.unwrap_or_else(|| self.shared.next_created()))
            }
            None => (EntityId::new(), self.shared.next_created()),
        };

        inner.writes.insert(
            (kind, id),
            StoredRecord {
                payload: record.payload().to_vec(),
                created,
            },
        );
        Ok(record.with_id(id))
    }
}

fn ensure_active(inner: &Inner, operation: Operation) -> StoreResult<()> {
    if inner.connection != ConnectionState::Connected {
        return Err(StoreError::invalid_state(
            operation,
            format!("resource is {:?}", inner.connection),
        ));
    }
    match inner.transaction {
        TransactionState::Active => Ok(()),
        TransactionState::NotStarted => Err(StoreError::invalid_state(
            operation,
            "transaction not started",
        )),
        TransactionState::Committed => Err(StoreError::invalid_state(
            operation,
            "transaction already committed",
        )),
        TransactionState::RolledBack => Err(StoreError::invalid_state(
            operation,
            "transaction already rolled back",
        )),
    }
}

#[async_trait]
impl UnitOfWork for MemoryTransaction {
    type Entity = Record;
    type Criteria = Criteria;

    async fn load(&self, kind: &str, criteria: &Criteria) -> TxResult<Vec<Record>> {
        self.enter(Operation::Load).await?;
        let records = self
            .load_now(kind, criteria)
            .map_err(|e| e.into_tx(Operation::Load))?;
        self.shared.stats.record_load();
        Ok(records)
    }

    async fn save(&self, record: Record) -> TxResult<Record> {
        self.enter(Operation::Save).await?;
        let saved = self
            .save_now(record)
            .map_err(|e| e.into_tx(Operation::Save))?;
        self.shared.stats.record_save();
        Ok(saved)
    }
}

#[async_trait]
impl TransactionResource for MemoryTransaction {
    async fn connect(&self) -> TxResult<()> {
        self.enter(Operation::Connect).await?;
        let mut inner = self.inner.lock();
        if inner.connection != ConnectionState::Disconnected {
            return Err(StoreError::invalid_state(
                Operation::Connect,
                format!("resource is {:?}", inner.connection),
            )
            .into_tx(Operation::Connect));
        }
        inner.connection = ConnectionState::Connected;
        self.shared.stats.record_connect();
        Ok(())
    }

    async fn begin_transaction(&self) -> TxResult<()> {
        self.enter(Operation::Begin).await?;
        let mut inner = self.inner.lock();
        if inner.connection != ConnectionState::Connected
            || inner.transaction != TransactionState::NotStarted
        {
            return Err(StoreError::invalid_state(
                Operation::Begin,
                format!("resource is {:?}/{:?}", inner.connection, inner.transaction),
            )
            .into_tx(Operation::Begin));
        }
        inner.transaction = TransactionState::Active;
        self.shared.stats.record_begin();
        debug!(resource = self.serial, "transaction started");
        Ok(())
    }

    async fn commit_transaction(&self) -> TxResult<()> {
        self.enter(Operation::Commit).await?;
        let mut inner = self.inner.lock();
        ensure_active(&inner, Operation::Commit).map_err(|e| e.into_tx(Operation::Commit))?;

        let writes = std::mem::take(&mut inner.writes);
        let count = writes.len();
        let sequence = self.shared.committed.write().apply(writes);
        inner.transaction = TransactionState::Committed;
        self.shared.stats.record_commit();
        debug!(resource = self.serial, sequence, writes = count, "committed");
        Ok(())
    }

    async fn rollback_transaction(&self) -> TxResult<()> {
        self.enter(Operation::Rollback).await?;
        let mut inner = self.inner.lock();
        if inner.connection == ConnectionState::Released {
            return Err(
                StoreError::invalid_state(Operation::Rollback, "resource is Released")
                    .into_tx(Operation::Rollback),
            );
        }
        let state = inner.transaction;
        match state {
            TransactionState::Active => {
                let discarded = inner.writes.len();
                inner.writes.clear();
                inner.transaction = TransactionState::RolledBack;
                self.shared.stats.record_rollback();
                debug!(resource = self.serial, discarded, "rolled back");
                Ok(())
            }
            TransactionState::NotStarted => {
                debug!(resource = self.serial, "nothing to roll back");
                Ok(())
            }
            state => Err(StoreError::invalid_state(
                Operation::Rollback,
                format!("transaction is {state:?}"),
            )
            .into_tx(Operation::Rollback)),
        }
    }

    async fn release(&self) -> TxResult<()> {
        self.enter(Operation::Release).await?;
        let mut inner = self.inner.lock();
        if inner.connection == ConnectionState::Released {
            return Err(
                StoreError::invalid_state(Operation::Release, "resource already released")
                    .into_tx(Operation::Release),
            );
        }
        if inner.transaction == TransactionState::Active {
            warn!(
                resource = self.serial,
                discarded = inner.writes.len(),
                "released with an active transaction; discarding writes"
            );
            inner.writes.clear();
            inner.transaction = TransactionState::RolledBack;
        }
        inner.connection = ConnectionState::Released;
        self.shared.stats.record_release();
        Ok(())
    }
}

impl fmt::Debug for MemoryTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("MemoryTransaction")
            .field("serial", &self.serial)
            .field("connection", &inner.connection)
            .field("transaction", &inner.transaction)
            .field("pending", &inner.writes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FaultPlan, StoreConfig};
    use crate::database::MemoryDatabase;
    use txscope_core::{ResourceFactory, TxError};

    fn record(name: &str) -> Record {
        Record::new("user", None, crate::codec::encode(&name).unwrap())
    }

    async fn started(db: &MemoryDatabase) -> MemoryTransaction {
        let txn = db.create_resource();
        txn.connect().await.unwrap();
        txn.begin_transaction().await.unwrap();
        txn
    }

    #[tokio::test]
    async fn lifecycle_states() {
        let db = MemoryDatabase::new();
        let txn = db.create_resource();
        assert_eq!(txn.connection_state(), ConnectionState::Disconnected);

        txn.connect().await.unwrap();
        txn.begin_transaction().await.unwrap();
        assert_eq!(txn.transaction_state(), TransactionState::Active);

        txn.commit_transaction().await.unwrap();
        assert_eq!(txn.transaction_state(), TransactionState::Committed);

        txn.release().await.unwrap();
        assert_eq!(txn.connection_state(), ConnectionState::Released);
        assert_eq!(db.stats().open_resources, 0);
    }

    #[tokio::test]
    async fn save_assigns_id_and_commit_publishes() {
        let db = MemoryDatabase::new();
        let txn = started(&db).await;

        let saved = txn.save(record("a")).await.unwrap();
        assert!(saved.id().is_some());
        assert_eq!(txn.pending_count(), 1);
        assert_eq!(db.committed_count("user"), 0);

        txn.commit_transaction().await.unwrap();
        assert_eq!(db.committed_count("user"), 1);
        assert_eq!(db.committed_seq(), 1);
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let db = MemoryDatabase::new();
        let txn = started(&db).await;

        txn.save(record("a")).await.unwrap();
        txn.rollback_transaction().await.unwrap();

        assert_eq!(txn.transaction_state(), TransactionState::RolledBack);
        assert_eq!(db.committed_count("user"), 0);
        assert_eq!(db.stats().rollbacks, 1);
    }

    #[tokio::test]
    async fn own_writes_visible_before_commit_only_to_self() {
        let db = MemoryDatabase::new();
        let writer = started(&db).await;
        let reader = started(&db).await;

        writer.save(record("a")).await.unwrap();

        assert_eq!(writer.load("user", &Criteria::All).await.unwrap().len(), 1);
        assert!(reader.load("user", &Criteria::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_keeps_insertion_order() {
        let db = MemoryDatabase::new();
        let txn = started(&db).await;

        let first = txn.save(record("a")).await.unwrap();
        txn.save(record("b")).await.unwrap();
        let id = first.id().unwrap();
        txn.save(Record::new("user", Some(id), crate::codec::encode(&"a!").unwrap()))
            .await
            .unwrap();
        txn.commit_transaction().await.unwrap();

        let rows = db.committed("user");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id(), Some(id));
        assert_eq!(crate::codec::decode::<String>(rows[0].payload()).unwrap(), "a!");
    }

    #[tokio::test]
    async fn save_outside_transaction_fails() {
        let db = MemoryDatabase::new();
        let txn = db.create_resource();
        txn.connect().await.unwrap();

        let err = txn.save(record("a")).await.unwrap_err();
        assert_eq!(err.operation(), Some(Operation::Save));
    }

    #[tokio::test]
    async fn rollback_before_begin_is_a_no_op() {
        let db = MemoryDatabase::new();
        let txn = db.create_resource();
        txn.rollback_transaction().await.unwrap();
        assert_eq!(db.stats().rollbacks, 0);
    }

    #[tokio::test]
    async fn double_release_fails() {
        let db = MemoryDatabase::new();
        let txn = db.create_resource();
        txn.release().await.unwrap();
        assert!(txn.release().await.is_err());
        assert!(txn.connect().await.is_err());
    }

    #[tokio::test]
    async fn release_discards_active_transaction() {
        let db = MemoryDatabase::new();
        let txn = started(&db).await;
        txn.save(record("a")).await.unwrap();

        txn.release().await.unwrap();

        assert_eq!(txn.transaction_state(), TransactionState::RolledBack);
        assert_eq!(db.committed_count("user"), 0);
    }

    #[tokio::test]
    async fn injected_fault_leaves_state_untouched() {
        let db = MemoryDatabase::with_config(
            StoreConfig::new().faults(FaultPlan::none().fail_on(Operation::Commit)),
        );
        let txn = started(&db).await;
        txn.save(record("a")).await.unwrap();

        let err = txn.commit_transaction().await.unwrap_err();
        assert!(matches!(
            err,
            TxError::Resource {
                operation: Operation::Commit,
                ..
            }
        ));
        assert_eq!(txn.transaction_state(), TransactionState::Active);

        txn.rollback_transaction().await.unwrap();
        assert_eq!(db.committed_count("user"), 0);
        assert_eq!(db.stats().faults, 1);
    }
}
