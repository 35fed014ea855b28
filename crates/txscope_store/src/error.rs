//! Error types for the in-memory store.

use thiserror::Error;
use txscope_core::{Operation, TxError};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Operation not permitted in the resource's current state.
    #[error("invalid state for {operation}: {message}")]
    InvalidState {
        /// The attempted operation.
        operation: Operation,
        /// Description of the state problem.
        message: String,
    },

    /// CBOR encoding or decoding failed.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// A record of one kind was decoded as another.
    #[error("kind mismatch: expected {expected}, found {actual}")]
    KindMismatch {
        /// Kind requested by the caller.
        expected: String,
        /// Kind stored in the record.
        actual: String,
    },

    /// Failure injected by the configured fault plan.
    #[error("injected fault on {0}")]
    InjectedFault(Operation),
}

impl StoreError {
    /// Creates an invalid state error.
    pub fn invalid_state(operation: Operation, message: impl Into<String>) -> Self {
        Self::InvalidState {
            operation,
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Wraps this error as a resource failure of `operation`.
    pub fn into_tx(self, operation: Operation) -> TxError {
        TxError::resource(operation, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_display() {
        let err = StoreError::invalid_state(Operation::Save, "transaction not active");
        assert_eq!(
            err.to_string(),
            "invalid state for save: transaction not active"
        );
    }

    #[test]
    fn into_tx_keeps_operation_and_source() {
        let err = StoreError::InjectedFault(Operation::Commit).into_tx(Operation::Commit);
        assert_eq!(err.operation(), Some(Operation::Commit));
        assert!(err.to_string().contains("injected fault on commit"));
    }
}
