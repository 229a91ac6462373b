//! Result poller and orphan sweeper.
//!
//! One poller per bridge drains the result queue into the correlation
//! table. A result is deleted from the queue only after it is in the table;
//! if the delete fails the result is redelivered and simply overwrites the
//! entry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use swarm_core::JobResult;
use swarm_queue::{MessageQueue, QueueResult, decode};

use crate::table::CorrelationTable;

pub struct ResultPoller {
    results: Arc<dyn MessageQueue>,
    table: Arc<CorrelationTable>,
    batch: usize,
    wait: Duration,
    error_pause: Duration,
}

impl ResultPoller {
    pub fn new(
        results: Arc<dyn MessageQueue>,
        table: Arc<CorrelationTable>,
        batch: usize,
        wait: Duration,
        error_pause: Duration,
    ) -> Self {
        Self {
            results,
            table,
            batch,
            wait,
            error_pause,
        }
    }

    /// One receive pass. Returns how many results were recorded.
    pub async fn drain_once(&self) -> QueueResult<usize> {
        let deliveries = self.results.receive(self.batch, self.wait).await?;
        let mut recorded = 0;

        for delivery in &deliveries {
            match decode::<JobResult>(&delivery.body) {
                Ok(result) => {
                    debug!(correlation_id = %result.correlation_id, failed = result.failed, "result received");
                    self.table.insert(result);
                    recorded += 1;
                }
                Err(e) => {
                    warn!(message_id = %delivery.message_id, error = %e, "discarding undecodable result");
                }
            }
            if let Err(e) = self.results.delete(&delivery.receipt).await {
                warn!(message_id = %delivery.message_id, error = %e, "failed to delete result message");
            }
        }

        Ok(recorded)
    }

    /// Drain until `shutdown` flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("result poller started");
        while !*shutdown.borrow() {
            let drained = tokio::select! {
                r = self.drain_once() => r,
                _ = shutdown.changed() => break,
            };

            if let Err(e) = drained {
                error!(error = %e, "error receiving from result queue");
                tokio::select! {
                    _ = tokio::time::sleep(self.error_pause) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }
        info!("result poller stopped");
    }
}

/// Floor applied to the sweep period.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Periodically drop results nobody claimed within `ttl`.
pub async fn run_sweeper(
    table: Arc<CorrelationTable>,
    ttl: Duration,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    // `interval` panics on a zero period.
    let mut interval = tokio::time::interval(every.max(MIN_SWEEP_INTERVAL));
    // The first tick of an interval completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                table.sweep(ttl);
            }
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }
    }
    debug!("orphan sweeper stopped");
}
