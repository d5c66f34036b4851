//! Counters for notification delivery.
//!
//! Relay and overflow failures never reach the caller of `create_comment`;
//! these counters are how operators see them.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of [`NotifyStats`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyStatsSnapshot {
    /// Comments handed to a subscriber queue.
    pub delivered: u64,
    /// Comments discarded because a subscriber queue was full.
    pub overflow_drops: u64,
    /// Subscribers removed by the `Disconnect` overflow policy.
    pub evicted_subscribers: u64,
    /// Notifications lost before reaching the relay (encode or publish).
    pub publish_failures: u64,
    /// Relay messages that did not decode as a comment.
    pub decode_failures: u64,
}

/// Thread-safe delivery counters.
#[derive(Debug, Default)]
pub struct NotifyStats {
    delivered: AtomicU64,
    overflow_drops: AtomicU64,
    evicted_subscribers: AtomicU64,
    publish_failures: AtomicU64,
    decode_failures: AtomicU64,
}

impl NotifyStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_delivered(&self, count: u64) {
        self.delivered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_overflow_drop(&self) {
        self.overflow_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evicted_subscribers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> NotifyStatsSnapshot {
        NotifyStatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            overflow_drops: self.overflow_drops.load(Ordering::Relaxed),
            evicted_subscribers: self.evicted_subscribers.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
        }
    }
}
