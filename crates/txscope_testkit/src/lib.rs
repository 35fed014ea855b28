//! # txscope Testkit
//!
//! Test utilities for txscope.
//!
//! This crate provides:
//! - [`RecordingFactory`]: a resource factory whose resources append every
//!   operation to a shared, ordered [`EventLog`], with failure injection
//! - Property-based generators for nesting and fork plans
//! - Fixtures that drive nested transactional calls to a given depth
//!
//! ## Usage
//!
//! ```rust,ignore
//! use txscope_testkit::prelude::*;
//!
//! let factory = RecordingFactory::new();
//! let tx = Transactional::new(Arc::new(factory.clone()));
//! block_on(run_nested(&tx, TxContext::new(), NestingPlan::new(3)))?;
//! assert_eq!(factory.log().count(Operation::Commit), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod recording;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::recording::*;
}

pub use fixtures::*;
pub use generators::*;
pub use recording::*;
