//! The worker poll loop.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use swarm_core::config::WorkerConfig;
use swarm_core::{JobRequest, JobResult};
use swarm_queue::{Delivery, QueuePair, decode, encode};
use swarm_store::{Locator, ObjectStore};

use crate::backoff::IdleBackoff;
use crate::compute::{ComputeCapability, ComputeError};
use crate::error::WorkerResult;

/// How a delivery was settled. Every disposition deletes the work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Computed and published a success result.
    Completed,
    /// Published an error result for the caller.
    Failed,
    /// Body could not be decoded; no caller can be notified.
    Malformed,
}

/// A single worker. Cheap to clone; clones share queues, store, and compute.
#[derive(Clone)]
pub struct Worker {
    id: String,
    queues: QueuePair,
    store: Arc<dyn ObjectStore>,
    compute: Arc<dyn ComputeCapability>,
    config: WorkerConfig,
    output_bucket: String,
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        queues: QueuePair,
        store: Arc<dyn ObjectStore>,
        compute: Arc<dyn ComputeCapability>,
        config: WorkerConfig,
        output_bucket: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            queues,
            store,
            compute,
            config,
            output_bucket: output_bucket.into(),
        }
    }

    /// A copy of this worker under a different id.
    pub fn with_id(&self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..self.clone()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resolve the payload, run compute, and store the output artifact.
    async fn execute(&self, request: &JobRequest) -> WorkerResult<String> {
        let locator: Locator = request.payload_reference.parse()?;
        let image = self.store.fetch(&locator)?;

        let compute = Arc::clone(&self.compute);
        let model = self.config.model.clone();
        let outcome = tokio::task::spawn_blocking(move || compute.evaluate(&image, &model))
            .await
            .map_err(|e| ComputeError::Aborted(e.to_string()))??;

        // The artifact is written for every computed outcome, including
        // outcomes that are themselves error strings.
        self.store
            .put(&self.output_bucket, request.stem(), outcome.as_bytes())?;
        Ok(outcome)
    }

    /// Settle one delivery up to, but not including, its deletion.
    ///
    /// An `Err` means no result reached the result queue; the caller must
    /// leave the message for redelivery.
    pub async fn handle(&self, delivery: &Delivery) -> WorkerResult<Disposition> {
        let request: JobRequest = match decode(&delivery.body) {
            Ok(r) => r,
            Err(e) => {
                error!(worker = %self.id, message_id = %delivery.message_id, error = %e, "malformed job request");
                return Ok(Disposition::Malformed);
            }
        };

        info!(
            worker = %self.id,
            correlation_id = %request.correlation_id,
            file = %request.file_name,
            attempt = delivery.receive_count,
            "processing job"
        );

        let result = match self.execute(&request).await {
            Ok(outcome) => {
                info!(correlation_id = %request.correlation_id, %outcome, "job computed");
                JobResult::success(&request.correlation_id, outcome)
            }
            Err(e) => {
                error!(correlation_id = %request.correlation_id, error = %e, "job failed");
                JobResult::failure(&request.correlation_id, e)
            }
        };

        self.queues.results.send(encode(&result)?).await?;
        debug!(correlation_id = %request.correlation_id, "result published");

        Ok(if result.failed {
            Disposition::Failed
        } else {
            Disposition::Completed
        })
    }

    /// Handle every delivery of a batch, deleting each one that settled.
    pub async fn process_batch(&self, deliveries: &[Delivery]) -> Vec<WorkerResult<Disposition>> {
        let mut outcomes = Vec::with_capacity(deliveries.len());
        for delivery in deliveries {
            let outcome = self.handle(delivery).await;
            match &outcome {
                Ok(_) => {
                    if let Err(e) = self.queues.work.delete(&delivery.receipt).await {
                        warn!(worker = %self.id, message_id = %delivery.message_id, error = %e, "failed to delete settled job");
                    }
                }
                Err(e) => {
                    error!(
                        worker = %self.id,
                        message_id = %delivery.message_id,
                        error = %e,
                        "could not publish result, leaving job for redelivery"
                    );
                }
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    /// One receive + process pass. Returns the number of deliveries.
    pub async fn poll_once(&self) -> WorkerResult<usize> {
        let deliveries = self
            .queues
            .work
            .receive(self.config.batch_size, self.config.receive_wait)
            .await?;
        self.process_batch(&deliveries).await;
        Ok(deliveries.len())
    }

    /// Run the poll loop until `shutdown` flips. A batch in progress is
    /// finished before the loop exits.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(worker = %self.id, "worker started");
        let mut backoff = IdleBackoff::new(
            self.config.idle_threshold,
            self.config.backoff_base,
            self.config.backoff_max,
        );

        while !*shutdown.borrow() {
            let received = tokio::select! {
                r = self.queues.work.receive(self.config.batch_size, self.config.receive_wait) => r,
                _ = shutdown.changed() => break,
            };

            let pause = match received {
                Ok(deliveries) if deliveries.is_empty() => backoff.record_empty(),
                Ok(deliveries) => {
                    backoff.record_activity();
                    debug!(worker = %self.id, count = deliveries.len(), "received jobs");
                    self.process_batch(&deliveries).await;
                    None
                }
                Err(e) => {
                    error!(worker = %self.id, error = %e, "error receiving from work queue");
                    Some(self.config.error_pause)
                }
            };

            if let Some(pause) = pause {
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }

        info!(worker = %self.id, "worker stopped");
    }
}
