use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use swarm_core::SwarmConfig;
use swarm_store::RedbObjectStore;
use swarm_worker::DigestLookup;
use swarmd::Fabric;

#[derive(Parser)]
#[command(name = "swarmd", about = "Swarm compute fabric daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every subsystem in one process.
    Standalone {
        /// TOML config file; defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides `[api] port`).
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,swarmd=debug,swarm_bridge=debug,swarm_autoscale=debug"
                    .parse()
                    .unwrap()
            }),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Standalone { config, port } => run_standalone(config, port).await,
    }
}

async fn run_standalone(config_path: Option<PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    info!("swarm daemon starting in standalone mode");

    let mut config = match &config_path {
        Some(path) => {
            let config = SwarmConfig::from_file(path)?;
            info!(path = ?path, "config loaded");
            config
        }
        None => SwarmConfig::default(),
    };
    if let Some(port) = port {
        config.api.port = port;
    }

    // ── Storage ────────────────────────────────────────────────

    let data_dir = config.store.data_dir.clone();
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("objects.redb");
    let store = Arc::new(RedbObjectStore::open(&db_path)?);
    info!(path = ?db_path, "object store opened");

    let model_dir = data_dir.join("models");
    let compute = Arc::new(DigestLookup::new(&model_dir));
    info!(path = ?model_dir, model = %config.worker.model, "compute initialized");

    // ── Subsystems ─────────────────────────────────────────────

    let fabric = Fabric::assemble(&config, store, compute);

    // ── API server ─────────────────────────────────────────────

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api.port));
    info!(%addr, "front door starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C. Background loops keep running until
    // in-flight requests have their answers.
    fabric
        .serve(listener, async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
        })
        .await?;

    info!("swarm daemon stopped");
    Ok(())
}
