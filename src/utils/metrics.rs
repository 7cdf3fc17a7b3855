//! Observability and Metrics
//!
//! Per-multiplexer counters, one per packet event status, plus byte totals.
//!
//! Uses atomic counters for thread-safe metrics collection. Each multiplexer
//! owns its own instance so several can run side by side in one process.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

use crate::core::packet::PacketStatus;

/// Metrics collector for packet events
#[derive(Debug)]
pub struct Metrics {
    /// Packets read off the wire
    pub read: AtomicU64,
    /// Packets dropped for exceeding the packet size
    pub rejected_too_large: AtomicU64,
    /// Packets the codec pipeline failed to decode
    pub rejected_unreadable: AtomicU64,
    /// Packets the dispatcher could not identify
    pub rejected_unidentified: AtomicU64,
    /// Packets routed to an identifier with no handler
    pub rejected_unassigned: AtomicU64,
    /// Packets whose handler succeeded
    pub processed: AtomicU64,
    /// Packets whose handler returned an error
    pub processed_failed: AtomicU64,
    /// Packets written to a socket
    pub sent: AtomicU64,
    /// Packets that failed to encode, connect or write
    pub send_failed: AtomicU64,
    /// Total bytes read
    pub bytes_received: AtomicU64,
    /// Total bytes written
    pub bytes_sent: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            read: AtomicU64::new(0),
            rejected_too_large: AtomicU64::new(0),
            rejected_unreadable: AtomicU64::new(0),
            rejected_unidentified: AtomicU64::new(0),
            rejected_unassigned: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            processed_failed: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            send_failed: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    fn counter(&self, status: PacketStatus) -> &AtomicU64 {
        match status {
            PacketStatus::Read => &self.read,
            PacketStatus::RejectedTooLarge => &self.rejected_too_large,
            PacketStatus::RejectedUnreadable => &self.rejected_unreadable,
            PacketStatus::RejectedUnidentified => &self.rejected_unidentified,
            PacketStatus::RejectedUnassigned => &self.rejected_unassigned,
            PacketStatus::Processed => &self.processed,
            PacketStatus::ProcessedFailed => &self.processed_failed,
            PacketStatus::Sent => &self.sent,
            PacketStatus::SendFailed => &self.send_failed,
        }
    }

    /// Record one event of the given status
    pub fn record(&self, status: PacketStatus) {
        self.counter(status).fetch_add(1, Ordering::Relaxed);
    }

    /// Record a packet read off the wire
    pub fn packet_read(&self, byte_count: u64) {
        self.record(PacketStatus::Read);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a packet written to a socket
    pub fn packet_sent(&self, byte_count: u64) {
        self.record(PacketStatus::Sent);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Current count for one status
    pub fn count(&self, status: PacketStatus) -> u64 {
        self.counter(status).load(Ordering::Relaxed)
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            read: self.read.load(Ordering::Relaxed),
            rejected_too_large: self.rejected_too_large.load(Ordering::Relaxed),
            rejected_unreadable: self.rejected_unreadable.load(Ordering::Relaxed),
            rejected_unidentified: self.rejected_unidentified.load(Ordering::Relaxed),
            rejected_unassigned: self.rejected_unassigned.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            processed_failed: self.processed_failed.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            send_failed: self.send_failed.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            read = snapshot.read,
            rejected_too_large = snapshot.rejected_too_large,
            rejected_unreadable = snapshot.rejected_unreadable,
            rejected_unidentified = snapshot.rejected_unidentified,
            rejected_unassigned = snapshot.rejected_unassigned,
            processed = snapshot.processed,
            processed_failed = snapshot.processed_failed,
            sent = snapshot.sent,
            send_failed = snapshot.send_failed,
            bytes_received = snapshot.bytes_received,
            bytes_sent = snapshot.bytes_sent,
            uptime_seconds = snapshot.uptime_seconds,
            "Multiplexer metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub read: u64,
    pub rejected_too_large: u64,
    pub rejected_unreadable: u64,
    pub rejected_unidentified: u64,
    pub rejected_unassigned: u64,
    pub processed: u64,
    pub processed_failed: u64,
    pub sent: u64,
    pub send_failed: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub uptime_seconds: u64,
}
