//! Controller and provisioning error types.

use thiserror::Error;

/// Result type alias for provisioning operations.
pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// Errors reported by a [`crate::Provisioner`].
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("launch failed: {0}")]
    Launch(String),

    #[error("terminate failed: {0}")]
    Terminate(String),

    #[error("list failed: {0}")]
    List(String),

    #[error("describe failed: {0}")]
    Describe(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),
}

/// Errors that abort a single controller tick.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("backlog read failed: {0}")]
    Backlog(#[from] swarm_queue::QueueError),

    #[error("provisioning error: {0}")]
    Provision(#[from] ProvisionError),
}
