//! # txscope Core
//!
//! Implicit transaction propagation for async data-access code.
//!
//! This crate provides:
//! - [`TxContext`]: a forkable call-chain context holding the active binding
//! - [`ambient`]: a task-local store for chains that do not pass a context
//! - [`Transactional`]: the wrapper that starts or joins a transaction
//! - [`ParameterMarks`] and [`Args`]: the marked-parameter substitution protocol
//! - [`ResourceFactory`] / [`TransactionResource`]: what a data-access layer
//!   must provide
//!
//! The outermost transactional call owns the transaction: it connects,
//! begins, commits or rolls back, and releases. Every nested call joins and
//! only sees a [`TxHandle`], which cannot end the transaction.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod ambient;
mod context;
mod error;
mod marks;
mod resource;
mod transactional;
mod types;

pub use context::{Binding, TxContext};
pub use error::{BoxError, TxError, TxResult};
pub use marks::{Args, ParameterMarks, TxSlot};
pub use resource::{ResourceFactory, TransactionResource, TxHandle, UnitOfWork};
pub use transactional::{ResourceOf, Transactional, TransactionalBuilder};
pub use types::{MethodId, Operation, TransactionId};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
