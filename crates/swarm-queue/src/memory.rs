//! In-process queue with visibility timeouts.
//!
//! Long polls park on a `Notify` and are woken by `send`, or by the
//! earliest in-flight message becoming visible again.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{QueueError, QueueResult};
use crate::queue::{Delivery, MAX_BATCH, MessageQueue, QueueFuture, ReceiptHandle};

struct Stored {
    id: String,
    body: String,
    receive_count: u32,
}

struct InFlight {
    message: Stored,
    visible_at: Instant,
}

#[derive(Default)]
struct Inner {
    visible: VecDeque<Stored>,
    /// In-flight messages keyed by the receipt of their current delivery.
    in_flight: HashMap<String, InFlight>,
}

impl Inner {
    /// Return every in-flight message whose visibility timeout has lapsed.
    fn reclaim(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, f)| f.visible_at <= now)
            .map(|(receipt, _)| receipt.clone())
            .collect();
        for receipt in expired {
            if let Some(f) = self.in_flight.remove(&receipt) {
                trace!(message_id = %f.message.id, "visibility timeout lapsed, message visible again");
                self.visible.push_back(f.message);
            }
        }
    }

    fn next_expiry(&self) -> Option<Instant> {
        self.in_flight.values().map(|f| f.visible_at).min()
    }
}

/// An in-memory [`MessageQueue`].
pub struct MemoryQueue {
    name: String,
    visibility_timeout: Duration,
    inner: Mutex<Inner>,
    notify: Notify,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>, visibility_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            visibility_timeout,
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of messages currently received but not yet deleted.
    pub async fn in_flight_len(&self) -> usize {
        self.inner.lock().await.in_flight.len()
    }

    async fn send_inner(&self, body: String) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        {
            let mut inner = self.inner.lock().await;
            inner.visible.push_back(Stored {
                id: id.clone(),
                body,
                receive_count: 0,
            });
        }
        self.notify.notify_waiters();
        trace!(queue = %self.name, message_id = %id, "message sent");
        id
    }

    async fn receive_inner(&self, max: usize, wait: Duration) -> Vec<Delivery> {
        let max = max.clamp(1, MAX_BATCH);
        let deadline = Instant::now() + wait;

        loop {
            // Register interest before inspecting the queue so a send that
            // lands in between still wakes us.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next_expiry = {
                let now = Instant::now();
                let mut inner = self.inner.lock().await;
                inner.reclaim(now);

                if !inner.visible.is_empty() {
                    let take = max.min(inner.visible.len());
                    let mut deliveries = Vec::with_capacity(take);
                    for mut message in inner.visible.drain(..take).collect::<Vec<_>>() {
                        message.receive_count += 1;
                        let receipt = uuid::Uuid::new_v4().to_string();
                        deliveries.push(Delivery {
                            message_id: message.id.clone(),
                            receipt: ReceiptHandle(receipt.clone()),
                            body: message.body.clone(),
                            receive_count: message.receive_count,
                        });
                        inner.in_flight.insert(
                            receipt,
                            InFlight {
                                message,
                                visible_at: now + self.visibility_timeout,
                            },
                        );
                    }
                    debug!(queue = %self.name, count = deliveries.len(), "messages received");
                    return deliveries;
                }

                inner.next_expiry()
            };

            let now = Instant::now();
            if now >= deadline {
                return Vec::new();
            }
            let wake_at = next_expiry.map_or(deadline, |e| e.min(deadline));

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn delete_inner(&self, receipt: &ReceiptHandle) -> QueueResult<()> {
        let mut inner = self.inner.lock().await;
        match inner.in_flight.remove(&receipt.0) {
            Some(f) => {
                trace!(queue = %self.name, message_id = %f.message.id, "message deleted");
                Ok(())
            }
            None => Err(QueueError::UnknownReceipt(receipt.0.clone())),
        }
    }

    async fn len_inner(&self) -> usize {
        let mut inner = self.inner.lock().await;
        inner.reclaim(Instant::now());
        inner.visible.len()
    }
}

impl MessageQueue for MemoryQueue {
    fn send(&self, body: String) -> QueueFuture<'_, String> {
        Box::pin(async move { Ok(self.send_inner(body).await) })
    }

    fn receive(&self, max: usize, wait: Duration) -> QueueFuture<'_, Vec<Delivery>> {
        Box::pin(async move { Ok(self.receive_inner(max, wait).await) })
    }

    fn delete<'a>(&'a self, receipt: &'a ReceiptHandle) -> QueueFuture<'a, ()> {
        Box::pin(self.delete_inner(receipt))
    }

    fn approximate_len(&self) -> QueueFuture<'_, usize> {
        Box::pin(async move { Ok(self.len_inner().await) })
    }
}
