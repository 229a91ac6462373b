//! The `MessageQueue` trait shared by the work and result queues.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::QueueResult;

/// Upper bound on messages returned by a single receive.
pub const MAX_BATCH: usize = 10;

/// Boxed future returned by queue operations.
pub type QueueFuture<'a, T> = Pin<Box<dyn Future<Output = QueueResult<T>> + Send + 'a>>;

/// Opaque per-delivery acknowledgment token.
///
/// A receipt identifies one delivery, not the message: once a message has
/// been redelivered, receipts from earlier deliveries are stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(pub String);

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message handed to a consumer.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message_id: String,
    pub receipt: ReceiptHandle,
    pub body: String,
    /// How many times this message has been received, this delivery included.
    pub receive_count: u32,
}

/// An unordered, at-least-once queue with visibility timeouts.
///
/// Implementations must be shareable across tasks; every consumer of the
/// fabric holds an `Arc<dyn MessageQueue>`.
pub trait MessageQueue: Send + Sync {
    /// Publish a message body. Returns the message id.
    fn send(&self, body: String) -> QueueFuture<'_, String>;

    /// Receive up to `max` visible messages, waiting at most `wait` for the
    /// first one to appear. An empty vector means the wait elapsed.
    fn receive(&self, max: usize, wait: Duration) -> QueueFuture<'_, Vec<Delivery>>;

    /// Acknowledge a delivery, removing the message for good.
    fn delete<'a>(&'a self, receipt: &'a ReceiptHandle) -> QueueFuture<'a, ()>;

    /// Approximate number of visible, undelivered messages. May lag actual
    /// activity.
    fn approximate_len(&self) -> QueueFuture<'_, usize>;
}
