//! Fan-out/fan-in launch and terminate batches.
//!
//! Every node operation runs as its own task so one slow or failing node
//! never holds up the rest. The batch joins all of them and reports a
//! per-node outcome in submission order.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use swarm_core::{NodeId, NodeState};

use crate::provision::{LaunchSpec, Provisioner};

/// Outcome of one node operation within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOutcome {
    /// Launch tag for launches, node id for terminations.
    pub node: String,
    /// Node id on success, error description on failure.
    pub result: Result<NodeId, String>,
}

impl NodeOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Joined outcomes of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<NodeOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }
}

async fn join_all(handles: Vec<(String, JoinHandle<Result<NodeId, String>>)>) -> BatchReport {
    let mut outcomes = Vec::with_capacity(handles.len());
    for (node, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(format!("task failed: {e}")),
        };
        outcomes.push(NodeOutcome { node, result });
    }
    BatchReport { outcomes }
}

/// Launch one node per spec concurrently.
pub async fn launch_batch(provisioner: Arc<dyn Provisioner>, specs: Vec<LaunchSpec>) -> BatchReport {
    let handles = specs
        .into_iter()
        .map(|spec| {
            let provisioner = Arc::clone(&provisioner);
            let tag = spec.tag.clone();
            let handle = tokio::spawn(async move {
                info!(tag = %spec.tag, "launching node");
                match provisioner.launch(&spec).await {
                    Ok(id) => Ok(id),
                    Err(e) => {
                        error!(tag = %spec.tag, error = %e, "node launch failed");
                        Err(e.to_string())
                    }
                }
            });
            (tag, handle)
        })
        .collect();

    join_all(handles).await
}

/// Terminate every node concurrently, waiting up to `timeout` per node for
/// it to reach `Terminated`.
pub async fn terminate_batch(
    provisioner: Arc<dyn Provisioner>,
    node_ids: Vec<NodeId>,
    timeout: Duration,
    poll: Duration,
) -> BatchReport {
    let handles = node_ids
        .into_iter()
        .map(|id| {
            let provisioner = Arc::clone(&provisioner);
            let node = id.clone();
            let handle = tokio::spawn(async move {
                terminate_and_wait(provisioner.as_ref(), id, timeout, poll).await
            });
            (node, handle)
        })
        .collect();

    join_all(handles).await
}

async fn terminate_and_wait(
    provisioner: &dyn Provisioner,
    id: NodeId,
    timeout: Duration,
    poll: Duration,
) -> Result<NodeId, String> {
    if let Err(e) = provisioner.terminate(&id).await {
        warn!(node_id = %id, error = %e, "error terminating node");
        return Err(e.to_string());
    }
    info!(node_id = %id, "terminating node");

    let confirmed = tokio::time::timeout(timeout, async {
        loop {
            match provisioner.describe(&id).await {
                Ok(Some(NodeState::Terminated)) | Ok(None) => return,
                Ok(Some(_)) => {}
                Err(e) => warn!(node_id = %id, error = %e, "describe failed while awaiting termination"),
            }
            tokio::time::sleep(poll).await;
        }
    })
    .await;

    match confirmed {
        Ok(()) => {
            info!(node_id = %id, "node terminated");
            Ok(id)
        }
        Err(_) => {
            warn!(node_id = %id, timeout_ms = timeout.as_millis() as u64, "node did not confirm termination");
            Err(format!("termination not confirmed within {timeout:?}"))
        }
    }
}
