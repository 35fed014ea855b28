//! Capabilities consumed from the data-access collaborator.
//!
//! The core never talks to a database itself. It needs:
//! - a [`ResourceFactory`] that manufactures a fresh resource per owned
//!   transaction, and
//! - the [`TransactionResource`] lifecycle operations of that resource.
//!
//! Business code only ever sees a [`TxHandle`], which exposes the
//! [`UnitOfWork`] surface and nothing else. Joining participants therefore
//! cannot commit, roll back, or release a transaction they do not own.

use crate::error::TxResult;
use crate::types::TransactionId;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Unit-of-work surface bound to one transaction.
///
/// Used by wrapped business logic, never by the core itself.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Entity representation moved in and out of the store.
    type Entity: Send + 'static;
    /// Selection criteria accepted by [`UnitOfWork::load`].
    type Criteria: Send + Sync + 'static;

    /// Loads all entities of `kind` matching `criteria`.
    async fn load(&self, kind: &str, criteria: &Self::Criteria) -> TxResult<Vec<Self::Entity>>;

    /// Saves an entity, returning the stored form (with any assigned identity).
    async fn save(&self, entity: Self::Entity) -> TxResult<Self::Entity>;
}

/// A handle on one database transaction.
///
/// Operations take `&self`: a resource is shared between its owner and any
/// joiners, so implementations use interior mutability.
///
/// # Invariants
///
/// - The owner calls `connect` → `begin_transaction` → (`commit_transaction`
///   | `rollback_transaction`) → `release`, strictly in that order.
/// - `release` is called exactly once.
#[async_trait]
pub trait TransactionResource: UnitOfWork {
    /// Acquires the underlying connection.
    async fn connect(&self) -> TxResult<()>;

    /// Starts the transaction.
    async fn begin_transaction(&self) -> TxResult<()>;

    /// Commits all work done through this resource.
    async fn commit_transaction(&self) -> TxResult<()>;

    /// Discards all work done through this resource.
    async fn rollback_transaction(&self) -> TxResult<()>;

    /// Returns the connection to its source. The resource is unusable
    /// afterwards.
    async fn release(&self) -> TxResult<()>;
}

/// Manufactures transaction resources on demand.
pub trait ResourceFactory: Send + Sync + 'static {
    /// The resource type produced.
    type Resource: TransactionResource + 'static;

    /// Creates a fresh, disconnected resource.
    fn create_resource(&self) -> Self::Resource;
}

impl<F: ResourceFactory> ResourceFactory for Arc<F> {
    type Resource = F::Resource;

    fn create_resource(&self) -> Self::Resource {
        (**self).create_resource()
    }
}

/// Use-only reference to the active transaction resource.
///
/// Cloning a handle shares the same underlying resource.
pub struct TxHandle<R> {
    resource: Arc<R>,
    id: TransactionId,
}

impl<R> TxHandle<R> {
    /// Creates a handle on `resource` for transaction `id`.
    ///
    /// [`Transactional`](crate::Transactional) creates the handle for every
    /// transaction it owns. Build one directly only to bind a resource whose
    /// lifecycle is managed elsewhere, for example when rebinding a forked
    /// [`TxContext`](crate::TxContext).
    #[must_use]
    pub fn new(resource: Arc<R>, id: TransactionId) -> Self {
        Self { resource, id }
    }

    /// Returns the ID of the transaction this handle belongs to.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns true if both handles refer to the same resource.
    #[must_use]
    pub fn same_resource(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.resource, &other.resource)
    }
}

impl<R: UnitOfWork> TxHandle<R> {
    /// Loads entities through the active transaction.
    pub async fn load(&self, kind: &str, criteria: &R::Criteria) -> TxResult<Vec<R::Entity>> {
        self.resource.load(kind, criteria).await
    }

    /// Saves an entity through the active transaction.
    pub async fn save(&self, entity: R::Entity) -> TxResult<R::Entity> {
        self.resource.save(entity).await
    }
}

impl<R> Clone for TxHandle<R> {
    fn clone(&self) -> Self {
        Self {
            resource: Arc::clone(&self.resource),
            id: self.id,
        }
    }
}

impl<R> fmt::Debug for TxHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
