//! Error types for queue operations.

use thiserror::Error;

/// Result type alias for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors that can occur while talking to a queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Raised by backends whose transport can fail; the in-memory queue
    /// never does.
    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("unknown or expired receipt: {0}")]
    UnknownReceipt(String),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
