//! # txscope Store
//!
//! An in-memory transactional store that plugs into `txscope_core`.
//!
//! [`MemoryDatabase`] is a [`txscope_core::ResourceFactory`]; each resource
//! it creates is a [`MemoryTransaction`] that buffers writes and publishes
//! them atomically on commit. Entities are encoded as CBOR [`Record`]s.
//!
//! Reads see committed state plus the resource's own pending writes. There is
//! no conflict detection: the last commit to touch a record wins.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod codec;
mod config;
mod database;
mod entity;
mod error;
mod record;
mod stats;
mod transaction;

pub use config::{FaultPlan, StoreConfig};
pub use database::MemoryDatabase;
pub use entity::{Entity, EntityId};
pub use error::{StoreError, StoreResult};
pub use record::{Criteria, Record};
pub use stats::{DatabaseStats, StatsSnapshot};
pub use transaction::{ConnectionState, MemoryTransaction, TransactionState};
