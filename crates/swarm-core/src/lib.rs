//! swarm-core — shared types and configuration for the swarm compute fabric.
//!
//! Holds the wire records exchanged over the work and result queues, the
//! worker node record owned by the fleet controller, and the TOML
//! configuration consumed by every subsystem.

pub mod config;
pub mod duration;
pub mod types;

pub use config::SwarmConfig;
pub use types::*;
