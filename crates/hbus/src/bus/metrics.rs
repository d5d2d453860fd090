// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bus instance counters
//!
//! Latency-friendly counters updated on the send/receive paths. All fields
//! use relaxed atomics, which is sufficient because consumers only need
//! monotonic snapshots for observability.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters tracking message admission and delivery outcomes.
#[derive(Debug)]
pub struct BusMetrics {
    /// Messages admitted (sequence numbers stamped).
    pub messages_admitted: AtomicU64,
    /// Per-target copies enqueued.
    pub copies_enqueued: AtomicU64,
    /// Messages handed to consumers by `recv`/`try_recv`.
    pub messages_delivered: AtomicU64,
    /// Fan-out copies dropped because a member queue was full.
    pub drops_queue_full: AtomicU64,
    /// Copies suppressed by a receive filter returning 0.
    pub drops_filtered: AtomicU64,
    /// Copies delivered only because the receiver eavesdrops.
    pub eavesdrop_copies: AtomicU64,
    /// Per-target handle duplication failures.
    pub handle_dup_errors: AtomicU64,
}

/// Point-in-time copy of [`BusMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub messages_admitted: u64,
    pub copies_enqueued: u64,
    pub messages_delivered: u64,
    pub drops_queue_full: u64,
    pub drops_filtered: u64,
    pub eavesdrop_copies: u64,
    pub handle_dup_errors: u64,
}

impl BusMetrics {
    /// Create a zeroed metrics struct ready for concurrent updates.
    #[inline]
    pub fn new() -> Self {
        Self {
            messages_admitted: AtomicU64::new(0),
            copies_enqueued: AtomicU64::new(0),
            messages_delivered: AtomicU64::new(0),
            drops_queue_full: AtomicU64::new(0),
            drops_filtered: AtomicU64::new(0),
            eavesdrop_copies: AtomicU64::new(0),
            handle_dup_errors: AtomicU64::new(0),
        }
    }

    /// Return the current counters without synchronisation penalties.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_admitted: self.messages_admitted.load(Ordering::Relaxed),
            copies_enqueued: self.copies_enqueued.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            drops_queue_full: self.drops_queue_full.load(Ordering::Relaxed),
            drops_filtered: self.drops_filtered.load(Ordering::Relaxed),
            eavesdrop_copies: self.eavesdrop_copies.load(Ordering::Relaxed),
            handle_dup_errors: self.handle_dup_errors.load(Ordering::Relaxed),
        }
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for BusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_bumps() {
        let metrics = BusMetrics::new();
        BusMetrics::bump(&metrics.messages_admitted);
        BusMetrics::bump(&metrics.messages_admitted);
        BusMetrics::bump(&metrics.drops_filtered);
        let snap = metrics.snapshot();
        assert_eq!(snap.messages_admitted, 2);
        assert_eq!(snap.drops_filtered, 1);
        assert_eq!(snap.messages_delivered, 0);
    }
}
