//! Idle backoff for the worker poll loop.
//!
//! Long polls already bound the cost of an empty queue; once a run of
//! empty polls exceeds the threshold the worker additionally sleeps,
//! doubling the pause up to a cap. One non-empty poll resets everything.

use std::time::Duration;

use tracing::debug;

/// Tracks consecutive empty polls for one worker.
#[derive(Debug)]
pub struct IdleBackoff {
    consecutive_empty: u32,
    /// Empty polls tolerated before sleeping.
    threshold: u32,
    current: Duration,
    base: Duration,
    max: Duration,
}

impl IdleBackoff {
    pub fn new(threshold: u32, base: Duration, max: Duration) -> Self {
        Self {
            consecutive_empty: 0,
            threshold,
            current: base,
            base,
            max,
        }
    }

    /// Record an empty poll. Returns how long to sleep, if at all.
    pub fn record_empty(&mut self) -> Option<Duration> {
        self.consecutive_empty += 1;
        if self.consecutive_empty <= self.threshold {
            return None;
        }

        let pause = self.current;
        self.current = (self.current * 2).min(self.max);
        debug!(
            empty_polls = self.consecutive_empty,
            pause_ms = pause.as_millis() as u64,
            "idle backoff"
        );
        Some(pause)
    }

    /// Record a poll that returned work.
    pub fn record_activity(&mut self) {
        self.consecutive_empty = 0;
        self.current = self.base;
    }

    pub fn consecutive_empty(&self) -> u32 {
        self.consecutive_empty
    }
}
