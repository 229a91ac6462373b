//! Fleet controller: converts work-queue backlog into worker lifecycle
//! actions.
//!
//! Sizing decisions live in the pure [`decide`] function; the controller
//! reads the signals, applies the decision through the provisioner, and
//! keeps the hysteresis state between ticks. A tick never runs
//! concurrently with another, so that state needs no locking.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use swarm_core::config::ControllerConfig;
use swarm_core::epoch_millis;
use swarm_queue::MessageQueue;

use crate::batch::{BatchReport, launch_batch, terminate_batch};
use crate::error::ControllerError;
use crate::provision::{LaunchSpec, NodeFilter, Provisioner};

/// A sizing decision for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Launch this many nodes.
    Launch(u32),
    /// Backlog exceeds the fleet but the fleet is at the ceiling.
    Saturated,
    /// Terminate every owned node.
    ScaleIn,
    /// No change needed.
    Hold,
}

/// Scale-in hysteresis carried between ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hysteresis {
    /// Consecutive ticks that observed an empty backlog.
    pub empty_ticks: u32,
    /// Set once a scale-out launched at least one node; scale-in is only
    /// considered while this is set.
    pub served_traffic: bool,
}

/// Decide what to do given backlog `backlog` and `active` nodes.
///
/// Updates the empty-tick counter. Arming `served_traffic` is left to the
/// caller, since it depends on whether the launches actually succeed.
pub fn decide(
    backlog: usize,
    active: u32,
    state: &mut Hysteresis,
    max_nodes: u32,
    scale_in_threshold: u32,
) -> ScaleDecision {
    let q = backlog as u64;
    let n = active as u64;

    if q > n {
        state.empty_ticks = 0;
        if active >= max_nodes {
            return ScaleDecision::Saturated;
        }
        let want = (q - n).min((max_nodes - active) as u64);
        return ScaleDecision::Launch(want as u32);
    }

    if backlog == 0 && state.served_traffic {
        state.empty_ticks += 1;
        if state.empty_ticks >= scale_in_threshold && active > 0 {
            *state = Hysteresis::default();
            return ScaleDecision::ScaleIn;
        }
        return ScaleDecision::Hold;
    }

    state.empty_ticks = 0;
    ScaleDecision::Hold
}

/// What a single tick observed and did.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub backlog: usize,
    pub active: u32,
    pub decision: ScaleDecision,
    /// Per-node results of the launch or terminate batch, if any ran.
    pub report: Option<BatchReport>,
}

/// The fleet controller.
pub struct FleetController {
    provisioner: Arc<dyn Provisioner>,
    backlog: Arc<dyn MessageQueue>,
    config: ControllerConfig,
    state: Hysteresis,
    /// Nodes requested over the controller's lifetime; suffixes every tag.
    launched: u64,
}

impl FleetController {
    /// Create a controller sizing the fleet from `backlog`'s depth.
    pub fn new(
        provisioner: Arc<dyn Provisioner>,
        backlog: Arc<dyn MessageQueue>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            provisioner,
            backlog,
            config,
            state: Hysteresis::default(),
            launched: 0,
        }
    }

    pub fn hysteresis(&self) -> Hysteresis {
        self.state
    }

    fn owned_filter(&self) -> NodeFilter {
        NodeFilter::active(&self.config.tag_prefix)
    }

    /// Terminate every active node carrying the ownership tag.
    pub async fn terminate_all(&self) -> Result<BatchReport, ControllerError> {
        let nodes = self.provisioner.list(&self.owned_filter()).await?;
        if nodes.is_empty() {
            return Ok(BatchReport::default());
        }
        let ids: Vec<_> = nodes.into_iter().map(|n| n.id).collect();
        info!(count = ids.len(), nodes = ?ids, "terminating nodes");

        Ok(terminate_batch(
            Arc::clone(&self.provisioner),
            ids,
            self.config.terminate_timeout,
            self.config.terminate_poll,
        )
        .await)
    }

    /// Startup reset: clear nodes left over from a previous run and forget
    /// any hysteresis state.
    pub async fn reset(&mut self) -> Result<BatchReport, ControllerError> {
        self.state = Hysteresis::default();
        let report = self.terminate_all().await?;
        if !report.is_empty() {
            info!(
                terminated = report.succeeded(),
                failed = report.failed(),
                "cleared orphaned nodes from a previous run"
            );
        }
        Ok(report)
    }

    /// Tags are `<prefix>-<epoch_millis>-<seq>`; `seq` never repeats within
    /// one controller, so batches in the same millisecond stay distinct.
    fn launch_specs(&mut self, count: u32) -> Vec<LaunchSpec> {
        let stamp = epoch_millis();
        let first = self.launched;
        self.launched += u64::from(count);
        (first..self.launched)
            .map(|seq| LaunchSpec {
                image: self.config.image.clone(),
                instance_type: self.config.instance_type.clone(),
                tag: format!("{}-{stamp}-{seq}", self.config.tag_prefix),
            })
            .collect()
    }

    /// Run one evaluation: read backlog and fleet size, decide, act.
    pub async fn tick(&mut self) -> Result<TickOutcome, ControllerError> {
        let backlog = self.backlog.approximate_len().await?;
        let active = self.provisioner.list(&self.owned_filter()).await?.len() as u32;

        debug!(backlog, active, "autoscale tick");

        let decision = decide(
            backlog,
            active,
            &mut self.state,
            self.config.max_nodes,
            self.config.scale_in_threshold,
        );

        let report = match decision {
            ScaleDecision::Launch(count) => {
                info!(backlog, active, count, "scaling out");
                let specs = self.launch_specs(count);
                let report = launch_batch(Arc::clone(&self.provisioner), specs).await;
                if report.succeeded() > 0 {
                    self.state.served_traffic = true;
                }
                if report.failed() > 0 {
                    warn!(
                        launched = report.succeeded(),
                        failed = report.failed(),
                        "some launches failed; next tick re-evaluates"
                    );
                }
                Some(report)
            }
            ScaleDecision::Saturated => {
                warn!(backlog, active, max = self.config.max_nodes, "fleet at ceiling, skipping launch");
                None
            }
            ScaleDecision::ScaleIn => {
                info!(
                    ticks = self.config.scale_in_threshold,
                    active, "backlog empty for consecutive ticks, scaling in"
                );
                Some(self.terminate_all().await?)
            }
            ScaleDecision::Hold => None,
        };

        Ok(TickOutcome {
            backlog,
            active,
            decision,
            report,
        })
    }

    /// Run the controller loop until `shutdown` flips.
    pub async fn run(&mut self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!(
            interval_ms = self.config.tick_interval.as_millis() as u64,
            max_nodes = self.config.max_nodes,
            "fleet controller started"
        );

        if let Err(e) = self.reset().await {
            error!(error = %e, "startup reset failed");
        }

        let interval: Duration = self.config.tick_interval;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "autoscale tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("fleet controller shutting down");
                    break;
                }
            }
        }
    }
}
