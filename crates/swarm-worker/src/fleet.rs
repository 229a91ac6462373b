//! LocalFleet: worker nodes as in-process tasks.
//!
//! Each launched node is a spawned [`Worker::run`] loop with its own
//! shutdown channel. Lifecycle mirrors a real provider: `pending` until the
//! task starts, `running` while it polls, `terminating` once asked to stop,
//! `terminated` when the loop has exited. Terminated records are pruned on
//! the next launch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, info};

use swarm_autoscale::{LaunchSpec, NodeFilter, ProvisionError, ProvisionFuture, Provisioner};
use swarm_core::{NodeId, NodeState, WorkerNode};

use crate::worker::Worker;

struct NodeSlot {
    node: WorkerNode,
    shutdown_tx: watch::Sender<bool>,
}

type Slots = Arc<Mutex<HashMap<NodeId, NodeSlot>>>;

fn lock(slots: &Slots) -> MutexGuard<'_, HashMap<NodeId, NodeSlot>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Move a node from `from` to `to`; no-op if it has already moved on.
fn transition(slots: &Slots, id: &str, from: &[NodeState], to: NodeState) {
    if let Some(slot) = lock(slots).get_mut(id)
        && from.contains(&slot.node.state)
    {
        slot.node.state = to;
    }
}

/// A [`Provisioner`] that runs workers inside this process.
pub struct LocalFleet {
    template: Worker,
    slots: Slots,
    seq: AtomicU64,
}

impl LocalFleet {
    /// Every node runs a clone of `template` under its own id.
    pub fn new(template: Worker) -> Self {
        Self {
            template,
            slots: Arc::new(Mutex::new(HashMap::new())),
            seq: AtomicU64::new(0),
        }
    }

    fn spawn_node(&self, spec: &LaunchSpec) -> NodeId {
        let id = format!("node-{}", self.seq.fetch_add(1, Ordering::SeqCst));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        {
            let mut slots = lock(&self.slots);
            slots.retain(|_, s| s.node.state != NodeState::Terminated);
            slots.insert(
                id.clone(),
                NodeSlot {
                    node: WorkerNode {
                        id: id.clone(),
                        state: NodeState::Pending,
                        tag: spec.tag.clone(),
                    },
                    shutdown_tx,
                },
            );
        }

        let worker = self.template.with_id(&id);
        let slots = Arc::clone(&self.slots);
        let node_id = id.clone();
        tokio::spawn(async move {
            transition(&slots, &node_id, &[NodeState::Pending], NodeState::Running);
            worker.run(shutdown_rx).await;
            transition(
                &slots,
                &node_id,
                &[NodeState::Pending, NodeState::Running, NodeState::Terminating],
                NodeState::Terminated,
            );
            debug!(%node_id, "node task exited");
        });

        info!(node_id = %id, tag = %spec.tag, image = %spec.image, "node launched");
        id
    }

    fn stop_node(&self, node_id: &str) -> Result<(), ProvisionError> {
        let mut slots = lock(&self.slots);
        let slot = slots
            .get_mut(node_id)
            .ok_or_else(|| ProvisionError::NodeNotFound(node_id.to_string()))?;
        if slot.node.state != NodeState::Terminated {
            slot.node.state = NodeState::Terminating;
        }
        // The receiver is gone once the task exited; nothing left to stop.
        let _ = slot.shutdown_tx.send(true);
        Ok(())
    }

    /// Ask every node to stop (for daemon shutdown).
    pub fn stop_all(&self) {
        let mut slots = lock(&self.slots);
        for slot in slots.values_mut() {
            if slot.node.state.is_active() {
                slot.node.state = NodeState::Terminating;
            }
            let _ = slot.shutdown_tx.send(true);
        }
        info!(nodes = slots.len(), "all local nodes asked to stop");
    }

    pub fn nodes(&self) -> Vec<WorkerNode> {
        lock(&self.slots).values().map(|s| s.node.clone()).collect()
    }
}

impl Provisioner for LocalFleet {
    fn launch<'a>(&'a self, spec: &'a LaunchSpec) -> ProvisionFuture<'a, NodeId> {
        Box::pin(async move { Ok(self.spawn_node(spec)) })
    }

    fn terminate<'a>(&'a self, node_id: &'a str) -> ProvisionFuture<'a, ()> {
        Box::pin(async move { self.stop_node(node_id) })
    }

    fn list<'a>(&'a self, filter: &'a NodeFilter) -> ProvisionFuture<'a, Vec<WorkerNode>> {
        Box::pin(async move {
            Ok(lock(&self.slots)
                .values()
                .filter(|s| filter.matches(&s.node))
                .map(|s| s.node.clone())
                .collect())
        })
    }

    fn describe<'a>(&'a self, node_id: &'a str) -> ProvisionFuture<'a, Option<NodeState>> {
        Box::pin(async move { Ok(lock(&self.slots).get(node_id).map(|s| s.node.state)) })
    }
}
