//! Error types for the object store.

use thiserror::Error;

/// Result type alias for object store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during object store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid locator: {0}")]
    InvalidLocator(String),
}
