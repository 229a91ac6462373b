//! Domain types shared across the fabric.
//!
//! `JobRequest` and `JobResult` are the JSON bodies carried by the work and
//! result queues. `WorkerNode` is the controller's view of a provisioned
//! worker.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique token linking a submitted request to its eventual result.
pub type CorrelationId = String;

/// Identifier assigned to a worker node by the provisioning layer.
pub type NodeId = String;

// ── Jobs ───────────────────────────────────────────────────────────

/// A unit of work published to the work queue.
///
/// The payload itself lives in the object store; the request only carries
/// its locator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobRequest {
    /// Original name of the uploaded file.
    pub file_name: String,
    /// Object store locator of the staged payload.
    pub payload_reference: String,
    pub correlation_id: CorrelationId,
    /// Unix timestamp (milliseconds) when the bridge created the request.
    #[serde(default)]
    pub submitted_at: u64,
}

impl JobRequest {
    pub fn new(
        file_name: impl Into<String>,
        payload_reference: impl Into<String>,
        correlation_id: impl Into<CorrelationId>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            payload_reference: payload_reference.into(),
            correlation_id: correlation_id.into(),
            submitted_at: epoch_millis(),
        }
    }

    /// File name without its extension (`photo.jpg` → `photo`).
    pub fn stem(&self) -> &str {
        file_stem(&self.file_name)
    }
}

/// The outcome of a job, published to the result queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobResult {
    /// Compute outcome, or `Error: <description>` for failed jobs.
    pub result: String,
    pub correlation_id: CorrelationId,
    #[serde(default, skip_serializing_if = "is_false")]
    pub failed: bool,
}

impl JobResult {
    pub fn success(correlation_id: impl Into<CorrelationId>, result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            correlation_id: correlation_id.into(),
            failed: false,
        }
    }

    pub fn failure(correlation_id: impl Into<CorrelationId>, error: impl fmt::Display) -> Self {
        Self {
            result: format!("Error: {error}"),
            correlation_id: correlation_id.into(),
            failed: true,
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Strip the extension from a file name. Only the first dot counts, so
/// `archive.tar.gz` becomes `archive`.
pub fn file_stem(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

// ── Worker nodes ───────────────────────────────────────────────────

/// Lifecycle state of a provisioned worker node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Pending,
    Running,
    Terminating,
    Terminated,
}

impl NodeState {
    /// States that count toward the fleet size.
    pub const ACTIVE: [NodeState; 2] = [NodeState::Pending, NodeState::Running];

    pub fn is_active(self) -> bool {
        matches!(self, NodeState::Pending | NodeState::Running)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeState::Pending => "pending",
            NodeState::Running => "running",
            NodeState::Terminating => "terminating",
            NodeState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// A worker node as seen by the fleet controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerNode {
    pub id: NodeId,
    pub state: NodeState,
    /// Ownership label; every node launched by the fabric carries the
    /// configured tag prefix.
    pub tag: String,
}

// ── Time ───────────────────────────────────────────────────────────

pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
