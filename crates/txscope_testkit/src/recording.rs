//! Recording resources.
//!
//! Every operation on a [`RecordingResource`] is appended to the factory's
//! [`EventLog`] before it runs, so a test can assert on the exact order of
//! lifecycle calls across all resources of one factory.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use txscope_core::{
    Operation, ResourceFactory, TransactionResource, TxError, TxResult, UnitOfWork,
};

/// One recorded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Serial of the resource the operation ran on.
    pub resource: u64,
    /// The operation.
    pub operation: Operation,
}

/// Ordered, shared log of operations.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, resource: u64, operation: Operation) {
        self.events.lock().push(Event {
            resource,
            operation,
        });
    }

    /// Returns a copy of all events in order.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Returns how many times `operation` was recorded.
    pub fn count(&self, operation: Operation) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| event.operation == operation)
            .count()
    }

    /// Returns the operations run on one resource, in order.
    pub fn operations_for(&self, resource: u64) -> Vec<Operation> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.resource == resource)
            .map(|event| event.operation)
            .collect()
    }

    /// Returns the lifecycle operations run on one resource, in order.
    pub fn lifecycle_for(&self, resource: u64) -> Vec<Operation> {
        self.operations_for(resource)
            .into_iter()
            .filter(|operation| operation.is_lifecycle())
            .collect()
    }

    /// Returns the distinct resource serials in first-seen order.
    pub fn resources(&self) -> Vec<u64> {
        let mut seen = Vec::new();
        for event in self.events.lock().iter() {
            if !seen.contains(&event.resource) {
                seen.push(event.resource);
            }
        }
        seen
    }

    /// Removes all events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

/// Factory of [`RecordingResource`]s sharing one [`EventLog`].
#[derive(Debug, Clone, Default)]
pub struct RecordingFactory {
    log: EventLog,
    failures: Arc<Mutex<HashSet<Operation>>>,
    created: Arc<AtomicU64>,
}

impl RecordingFactory {
    /// Creates a factory whose resources never fail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every resource created from now on fail `operation`.
    #[must_use]
    pub fn failing_on(self, operation: Operation) -> Self {
        self.failures.lock().insert(operation);
        self
    }

    /// Returns the shared event log.
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Returns the number of resources created.
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }
}

impl ResourceFactory for RecordingFactory {
    type Resource = RecordingResource;

    fn create_resource(&self) -> RecordingResource {
        let serial = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        RecordingResource {
            serial,
            log: self.log.clone(),
            failures: self.failures.lock().clone(),
            saved: Mutex::new(Vec::new()),
        }
    }
}

/// Resource that records each operation and stores saved strings in memory.
#[derive(Debug)]
pub struct RecordingResource {
    serial: u64,
    log: EventLog,
    failures: HashSet<Operation>,
    saved: Mutex<Vec<String>>,
}

impl RecordingResource {
    /// Returns the resource serial, starting at 1 per factory.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    async fn record(&self, operation: Operation) -> TxResult<()> {
        self.log.push(self.serial, operation);
        tokio::task::yield_now().await;
        if self.failures.contains(&operation) {
            return Err(TxError::resource(
                operation,
                format!("injected {operation} failure on resource {}", self.serial),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for RecordingResource {
    type Entity = String;
    type Criteria = ();

    async fn load(&self, _kind: &str, _criteria: &()) -> TxResult<Vec<String>> {
        self.record(Operation::Load).await?;
        Ok(self.saved.lock().clone())
    }

    async fn save(&self, entity: String) -> TxResult<String> {
        self.record(Operation::Save).await?;
        self.saved.lock().push(entity.clone());
        Ok(entity)
    }
}

#[async_trait]
impl TransactionResource for RecordingResource {
    async fn connect(&self) -> TxResult<()> {
        self.record(Operation::Connect).await
    }

    async fn begin_transaction(&self) -> TxResult<()> {
        self.record(Operation::Begin).await
    }

    async fn commit_transaction(&self) -> TxResult<()> {
        self.record(Operation::Commit).await
    }

    async fn rollback_transaction(&self) -> TxResult<()> {
        self.record(Operation::Rollback).await
    }

    async fn release(&self) -> TxResult<()> {
        self.record(Operation::Release).await
    }
}
