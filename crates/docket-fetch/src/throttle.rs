//! Shared per-host request throttle
//!
//! A token-bucket over send slots, not a per-request sleep: every fetch
//! against a host reserves the next free slot under one lock, then waits
//! for it. N concurrent callers therefore observe send times spaced by at
//! least the configured interval, regardless of N.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Shared rate limiter keyed by origin host
pub struct HostThrottle {
    interval: Duration,
    slots: Mutex<HashMap<String, Instant>>,
}

impl HostThrottle {
    /// Create a throttle with the given minimum inter-request interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Reserve the next send slot for `host` and wait until it arrives.
    ///
    /// Returns the granted slot instant (used by tests to assert spacing).
    pub async fn acquire(&self, host: &str) -> Instant {
        let slot = {
            let mut slots = self.slots.lock().await;
            let now = Instant::now();
            let slot = slots.get(host).copied().unwrap_or(now).max(now);
            slots.insert(host.to_string(), slot + self.interval);
            slot
        };
        // The lock is released before waiting; other callers can reserve
        // their own (later) slots while this one sleeps.
        tokio::time::sleep_until(slot).await;
        slot
    }
}
