//! swarm-autoscale — backlog-driven fleet sizing.
//!
//! Reads the work-queue backlog `Q` and the active node count `N` every
//! tick and converts the difference into launch/terminate actions against
//! a [`Provisioner`].
//!
//! # Scaling Algorithm
//!
//! ```text
//! startup:
//!     terminate every node carrying the ownership tag
//!
//! each tick:
//!     if Q > N:
//!         if N >= max: saturated, no action
//!         else: launch min(Q - N, max - N), arm scale-in
//!     elif Q == 0 and armed:
//!         empty_ticks += 1
//!         if empty_ticks >= threshold and N > 0:
//!             terminate all, disarm
//!     else:
//!         empty_ticks = 0
//! ```
//!
//! Scale-in is all-or-nothing: workers are homogeneous and stateless
//! between jobs, so the controller never tracks per-node idleness.

pub mod batch;
pub mod controller;
pub mod error;
pub mod provision;

pub use batch::{BatchReport, NodeOutcome};
pub use controller::{FleetController, Hysteresis, ScaleDecision, TickOutcome, decide};
pub use error::{ControllerError, ProvisionError, ProvisionResult};
pub use provision::{LaunchSpec, NodeFilter, ProvisionFuture, Provisioner};
