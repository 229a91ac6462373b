//! The provisioning seam: how the controller launches, terminates, and
//! discovers worker nodes.

use std::future::Future;
use std::pin::Pin;

use swarm_core::{NodeId, NodeState, WorkerNode};

use crate::error::ProvisionResult;

/// Boxed future returned by provisioner operations.
pub type ProvisionFuture<'a, T> = Pin<Box<dyn Future<Output = ProvisionResult<T>> + Send + 'a>>;

/// Parameters for launching one worker node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub image: String,
    pub instance_type: String,
    /// Unique, time-derived ownership label.
    pub tag: String,
}

/// Selects nodes by ownership tag prefix and lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFilter {
    pub tag_prefix: String,
    /// Empty matches every state.
    pub states: Vec<NodeState>,
}

impl NodeFilter {
    /// Active (pending or running) nodes under `tag_prefix`.
    pub fn active(tag_prefix: impl Into<String>) -> Self {
        Self {
            tag_prefix: tag_prefix.into(),
            states: NodeState::ACTIVE.to_vec(),
        }
    }

    /// A node matches when its tag is `<tag_prefix>-...`. A bare
    /// `starts_with` would also claim `<tag_prefix>2-...`.
    pub fn matches(&self, node: &WorkerNode) -> bool {
        let owned = node
            .tag
            .strip_prefix(self.tag_prefix.as_str())
            .is_some_and(|rest| rest.starts_with('-'));
        owned && (self.states.is_empty() || self.states.contains(&node.state))
    }
}

/// Launches, terminates, and lists worker nodes.
///
/// The controller is the only caller; nodes never register themselves.
pub trait Provisioner: Send + Sync {
    /// Start one node. Returns its id once the launch is accepted; the node
    /// may still be pending.
    fn launch<'a>(&'a self, spec: &'a LaunchSpec) -> ProvisionFuture<'a, NodeId>;

    /// Request termination of a node. Completion is observed via `describe`.
    fn terminate<'a>(&'a self, node_id: &'a str) -> ProvisionFuture<'a, ()>;

    fn list<'a>(&'a self, filter: &'a NodeFilter) -> ProvisionFuture<'a, Vec<WorkerNode>>;

    /// Current state of a node, or `None` if the provider no longer knows it.
    fn describe<'a>(&'a self, node_id: &'a str) -> ProvisionFuture<'a, Option<NodeState>>;
}
