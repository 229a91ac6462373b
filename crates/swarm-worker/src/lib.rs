//! swarm-worker — the queue consumer/producer shell around compute.
//!
//! A worker long-polls the work queue, resolves each job's payload from
//! the object store, runs the compute capability, stores the output
//! artifact, and publishes a result. A work item is deleted only once its
//! result (success or error) has been published, so a worker that dies
//! mid-job leaves the message to reappear after its visibility timeout.
//!
//! # Architecture
//!
//! ```text
//! Worker::run
//!   ├── work.receive(batch, wait)      long poll
//!   ├── per delivery:
//!   │   ├── store.fetch(locator)
//!   │   ├── compute.evaluate()         blocking pool
//!   │   ├── store.put(output, stem)
//!   │   ├── results.send(JobResult)
//!   │   └── work.delete(receipt)       only after the send
//!   └── IdleBackoff                    on consecutive empty polls
//! ```
//!
//! [`LocalFleet`] runs workers as in-process "nodes" behind the
//! [`swarm_autoscale::Provisioner`] seam.

pub mod backoff;
pub mod compute;
pub mod error;
pub mod fleet;
pub mod worker;

pub use backoff::IdleBackoff;
pub use compute::{ComputeCapability, ComputeError, DigestLookup};
pub use error::{WorkerError, WorkerResult};
pub use fleet::LocalFleet;
pub use worker::{Disposition, Worker};
