//! Protocol counters
//!
//! Counters only, monotonic, shared by every query of a session.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Correlation counters for one session
#[derive(Debug, Default)]
pub struct ProtocolMetrics {
    requests_sent: AtomicU64,
    replies_matched: AtomicU64,
    error_replies: AtomicU64,
    timeouts: AtomicU64,
    late_replies: AtomicU64,
    channel_closed: AtomicU64,
    abandoned: AtomicU64,
}

impl ProtocolMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_requests_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_replies_matched(&self) {
        self.replies_matched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_error_replies(&self) {
        self.error_replies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_timeouts(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_late_replies(&self) {
        self.late_replies.fetch_add(1, Ordering::Relaxed);
    }

    /// A sent request that failed because the worker hung up
    pub fn increment_channel_closed(&self) {
        self.channel_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// A sent request whose caller went away before it settled
    pub fn increment_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_sent(&self) -> u64 {
        self.requests_sent.load(Ordering::Relaxed)
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    pub fn late_replies(&self) -> u64 {
        self.late_replies.load(Ordering::Relaxed)
    }

    pub fn abandoned(&self) -> u64 {
        self.abandoned.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            replies_matched: self.replies_matched.load(Ordering::Relaxed),
            error_replies: self.error_replies.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            late_replies: self.late_replies.load(Ordering::Relaxed),
            channel_closed: self.channel_closed.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_sent: u64,
    pub replies_matched: u64,
    pub error_replies: u64,
    pub timeouts: u64,
    pub late_replies: u64,
    pub channel_closed: u64,
    pub abandoned: u64,
}

impl MetricsSnapshot {
    /// Requests that have not settled yet: no reply, no timeout, no
    /// hang-up, and the caller is still waiting
    pub fn in_flight(&self) -> u64 {
        self.requests_sent
            .saturating_sub(self.replies_matched)
            .saturating_sub(self.timeouts)
            .saturating_sub(self.channel_closed)
            .saturating_sub(self.abandoned)
    }
}
