//! swarmd — the swarm daemon.
//!
//! Assembles every subsystem in one process:
//! - Object store (redb)
//! - Work and result queues
//! - Correlation bridge (result poller + orphan sweeper)
//! - Fleet controller driving an in-process worker fleet
//! - HTTP front door
//!
//! # Usage
//!
//! ```text
//! swarmd standalone --config swarm.toml --port 8000
//! ```

pub mod fabric;

pub use fabric::{Fabric, FabricHandle};
