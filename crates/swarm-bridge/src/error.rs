//! Bridge error types.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors surfaced to a submitting caller.
///
/// `Staging` and `Submission` mean the job never reached the work queue.
/// `Timeout` means it did, but no result arrived in time; the job may
/// still complete later.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("payload staging failed: {0}")]
    Staging(#[from] swarm_store::StoreError),

    #[error("job submission failed: {0}")]
    Submission(#[from] swarm_queue::QueueError),

    #[error("no result for {correlation_id} within {waited:?}")]
    Timeout {
        correlation_id: String,
        waited: Duration,
    },
}

impl BridgeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BridgeError::Timeout { .. })
    }
}
