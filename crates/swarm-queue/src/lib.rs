//! swarm-queue — the message substrate of the fabric.
//!
//! Two independent queues connect the bridge and the workers: the work
//! queue (bridge → worker) and the result queue (worker → bridge). Both are
//! unordered, at-least-once, and visibility-timeout based:
//!
//! ```text
//! send ──► [visible] ──receive──► [in flight] ──delete(receipt)──► gone
//!              ▲                        │
//!              └── visibility timeout ──┘
//! ```
//!
//! A received message is hidden from other consumers until it is deleted
//! or its visibility timeout lapses, after which any consumer may receive
//! it again under a fresh receipt.

pub mod codec;
pub mod error;
pub mod memory;
pub mod queue;
pub mod retry;

pub use codec::{decode, encode};
pub use error::{QueueError, QueueResult};
pub use memory::MemoryQueue;
pub use queue::{Delivery, MessageQueue, QueueFuture, ReceiptHandle, MAX_BATCH};
pub use retry::{send_with_retry, RetryPolicy};

use std::sync::Arc;
use std::time::Duration;

/// The work and result queues of one fabric.
#[derive(Clone)]
pub struct QueuePair {
    /// Bridge → worker.
    pub work: Arc<dyn MessageQueue>,
    /// Worker → bridge.
    pub results: Arc<dyn MessageQueue>,
}

impl QueuePair {
    /// Two fresh in-memory queues sharing one visibility timeout.
    pub fn in_memory(visibility_timeout: Duration) -> Self {
        Self {
            work: Arc::new(MemoryQueue::new("work", visibility_timeout)),
            results: Arc::new(MemoryQueue::new("results", visibility_timeout)),
        }
    }
}
