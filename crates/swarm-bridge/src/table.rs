//! Correlation table: results waiting to be claimed by their callers.
//!
//! The poller inserts, the waiting caller pops. Every operation takes the
//! single table lock for the duration of one map operation only, and an
//! insert wakes every waiter so each can check for its own id.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio::sync::futures::Notified;
use tracing::{debug, info};

use swarm_core::{CorrelationId, JobResult};

struct Entry {
    result: JobResult,
    inserted_at: Instant,
}

/// Results keyed by correlation id.
#[derive(Default)]
pub struct CorrelationTable {
    entries: Mutex<HashMap<CorrelationId, Entry>>,
    inserted: Notify,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CorrelationId, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a result, overwriting a previous delivery of the same id.
    /// Returns true if an entry was replaced.
    pub fn insert(&self, result: JobResult) -> bool {
        let id = result.correlation_id.clone();
        let replaced = self
            .lock()
            .insert(
                id.clone(),
                Entry {
                    result,
                    inserted_at: Instant::now(),
                },
            )
            .is_some();
        if replaced {
            debug!(correlation_id = %id, "duplicate result delivery overwrote entry");
        }
        self.inserted.notify_waiters();
        replaced
    }

    /// Atomically read and remove the result for `id`.
    pub fn pop(&self, id: &str) -> Option<JobResult> {
        self.lock().remove(id).map(|e| e.result)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove entries older than `ttl`. Returns how many were dropped.
    pub fn sweep(&self, ttl: Duration) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| e.inserted_at.elapsed() <= ttl);
        let removed = before - entries.len();
        if removed > 0 {
            info!(removed, remaining = entries.len(), "swept orphaned results");
        }
        removed
    }

    /// A future that completes on the next insert. Enable it before
    /// checking the table to avoid missing a wakeup.
    pub fn notified(&self) -> Notified<'_> {
        self.inserted.notified()
    }
}
