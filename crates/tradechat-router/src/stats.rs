// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Router statistics.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters updated while routing.
#[derive(Debug)]
pub struct RouterStats {
    /// Inbound messages accepted for routing.
    pub messages_routed: AtomicU64,

    /// Broadcast fan-outs performed.
    pub broadcasts: AtomicU64,

    /// Direct messages delivered or attempted.
    pub direct_messages: AtomicU64,

    /// Successful delivery attempts.
    pub deliveries: AtomicU64,

    /// Failed or timed-out delivery attempts.
    pub delivery_failures: AtomicU64,

    /// Peers removed after a failed delivery.
    pub evictions: AtomicU64,

    /// Peer registrations.
    pub registrations: AtomicU64,

    /// Router creation time.
    pub created: Instant,
}

impl RouterStats {
    pub fn new() -> Self {
        Self {
            messages_routed: AtomicU64::new(0),
            broadcasts: AtomicU64::new(0),
            direct_messages: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            registrations: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats.
    pub fn snapshot(&self) -> RouterStatsSnapshot {
        RouterStatsSnapshot {
            messages_routed: self.messages_routed.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            direct_messages: self.direct_messages.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            uptime_secs: self.created.elapsed().as_secs(),
        }
    }
}

impl Default for RouterStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of router statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouterStatsSnapshot {
    pub messages_routed: u64,
    pub broadcasts: u64,
    pub direct_messages: u64,
    pub deliveries: u64,
    pub delivery_failures: u64,
    pub evictions: u64,
    pub registrations: u64,
    pub uptime_secs: u64,
}

impl RouterStatsSnapshot {
    /// Calculate routed messages per second.
    pub fn messages_per_second(&self) -> f64 {
        if self.uptime_secs > 0 {
            self.messages_routed as f64 / self.uptime_secs as f64
        } else {
            0.0
        }
    }
}
