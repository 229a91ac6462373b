//! Worker error types.

use thiserror::Error;

use crate::compute::ComputeError;

/// Result type alias for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("queue error: {0}")]
    Queue(#[from] swarm_queue::QueueError),

    #[error("object store error: {0}")]
    Store(#[from] swarm_store::StoreError),

    #[error("compute error: {0}")]
    Compute(#[from] ComputeError),
}
