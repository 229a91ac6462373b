//! Fabric assembly.
//!
//! A [`Fabric`] holds one bridge, one controller, and the local fleet the
//! controller sizes, all sharing a single pair of queues and one object
//! store. [`Fabric::start`] spawns the background loops on a shutdown
//! channel owned by the returned [`FabricHandle`].
//!
//! Callers still waiting on the bridge need the result poller and the
//! workers, so [`Fabric::serve`] stops the loops only after the HTTP server
//! has drained its in-flight requests.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use swarm_autoscale::FleetController;
use swarm_bridge::Bridge;
use swarm_core::SwarmConfig;
use swarm_queue::QueuePair;
use swarm_store::ObjectStore;
use swarm_worker::{ComputeCapability, LocalFleet, Worker};

/// Every subsystem of one standalone deployment, not yet running.
pub struct Fabric {
    pub queues: QueuePair,
    pub store: Arc<dyn ObjectStore>,
    pub bridge: Bridge,
    pub fleet: Arc<LocalFleet>,
    pub controller: FleetController,
}

impl Fabric {
    /// Wire the subsystems over fresh in-memory queues.
    pub fn assemble(
        config: &SwarmConfig,
        store: Arc<dyn ObjectStore>,
        compute: Arc<dyn ComputeCapability>,
    ) -> Self {
        let queues = QueuePair::in_memory(config.queue.visibility_timeout);

        let bridge = Bridge::new(
            config.bridge.clone(),
            Arc::clone(&queues.work),
            Arc::clone(&store),
            config.store.input_bucket.clone(),
        );

        let template = Worker::new(
            "template",
            queues.clone(),
            Arc::clone(&store),
            compute,
            config.worker.clone(),
            config.store.output_bucket.clone(),
        );
        let fleet = Arc::new(LocalFleet::new(template));

        let controller = FleetController::new(
            fleet.clone(),
            Arc::clone(&queues.work),
            config.controller.clone(),
        );

        Self {
            queues,
            store,
            bridge,
            fleet,
            controller,
        }
    }

    /// The front-door router, bound to this fabric's bridge.
    pub fn router(&self) -> Router {
        swarm_api::build_router(self.bridge.clone())
    }

    /// Spawn the bridge loops and the controller loop. They run until
    /// [`FabricHandle::shutdown`].
    pub fn start(self) -> FabricHandle {
        let (shutdown_tx, shutdown) = watch::channel(false);
        let mut tasks = self
            .bridge
            .start(Arc::clone(&self.queues.results), shutdown.clone());

        let mut controller = self.controller;
        tasks.push(tokio::spawn(async move {
            controller.run(shutdown).await;
        }));

        info!(tasks = tasks.len(), "fabric started");
        FabricHandle {
            shutdown_tx,
            tasks,
            fleet: self.fleet,
        }
    }

    /// Serve the front door on `listener` until `signal` resolves and every
    /// in-flight request has been answered, then stop the fabric.
    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        let handle = self.start();

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await;
        info!("front door drained");

        handle.shutdown().await;
        Ok(served?)
    }
}

/// Background tasks of a started fabric.
pub struct FabricHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    fleet: Arc<LocalFleet>,
}

impl FabricHandle {
    pub fn fleet(&self) -> &Arc<LocalFleet> {
        &self.fleet
    }

    /// Signal every loop, wait for them to exit, then stop all workers.
    pub async fn shutdown(self) {
        // Receivers live in the spawned loops; a send error means they
        // have all exited already.
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        self.fleet.stop_all();
        info!("fabric stopped");
    }
}
