//! Error types for txscope core.

use crate::types::{MethodId, Operation};
use thiserror::Error;

/// Boxed error produced by a resource implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for core operations.
pub type TxResult<T> = Result<T, TxError>;

/// Errors raised by the propagation machinery or by a transaction resource.
///
/// Errors produced by the wrapped business logic are not part of this enum:
/// the wrapper is generic over the caller's error type and re-raises those
/// unchanged.
#[derive(Debug, Error)]
pub enum TxError {
    /// A transactional wrapper was built without a resource factory.
    #[error("no connection source configured for transactional scope")]
    MissingConnectionSource,

    /// A method was invoked through the marked-parameter protocol without a
    /// registered mark.
    #[error("transactional method {method} has no marked resource parameter")]
    MissingParameterMark {
        /// The unmarked method.
        method: MethodId,
    },

    /// The registered mark points past the end of the argument list.
    #[error("marked parameter {position} of {method} is out of range for {arity} arguments")]
    InvalidParameterMark {
        /// The misconfigured method.
        method: MethodId,
        /// The registered position.
        position: usize,
        /// Number of arguments supplied.
        arity: usize,
    },

    /// The placeholder resource was used outside any transactional scope.
    #[error("placeholder transaction resource used outside a transactional scope")]
    PlaceholderResource,

    /// An argument did not have the type the method expected.
    #[error("argument {position} has an unexpected type")]
    ArgumentType {
        /// Position of the offending argument.
        position: usize,
    },

    /// A resource operation failed.
    #[error("{operation} failed: {source}")]
    Resource {
        /// The operation that failed.
        operation: Operation,
        /// The underlying failure.
        #[source]
        source: BoxError,
    },
}

impl TxError {
    /// Creates a resource error for the given operation.
    pub fn resource(operation: Operation, source: impl Into<BoxError>) -> Self {
        Self::Resource {
            operation,
            source: source.into(),
        }
    }

    /// Creates a missing parameter mark error.
    pub fn missing_mark(method: MethodId) -> Self {
        Self::MissingParameterMark { method }
    }

    /// Returns the failed resource operation, if this is a resource error.
    #[must_use]
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Resource { operation, .. } => Some(*operation),
            _ => None,
        }
    }

    /// Returns true if this error indicates a misconfigured wrapper or method
    /// rather than a runtime failure.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingConnectionSource
                | Self::MissingParameterMark { .. }
                | Self::InvalidParameterMark { .. }
        )
    }
}
