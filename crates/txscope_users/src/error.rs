//! Error types for the user layer.

use thiserror::Error;
use txscope_core::TxError;
use txscope_store::StoreError;

/// Result type for user operations.
pub type UserResult<T> = Result<T, UserError>;

/// Errors raised by [`crate::UserDao`] and [`crate::UserService`].
#[derive(Debug, Error)]
pub enum UserError {
    /// Transaction propagation or resource failure.
    #[error(transparent)]
    Tx(#[from] TxError),

    /// Entity encoding failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Business failure raised by a service flow.
    #[error("{0}")]
    Unknown(String),
}

impl UserError {
    /// Creates an [`UserError::Unknown`].
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown(message.into())
    }
}
