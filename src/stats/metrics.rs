//! Statistics for connections and the broker

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Per-connection statistics
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Total bytes received
    pub bytes_received: u64,
    /// Complete frames decoded
    pub frames_received: u64,
    /// Frames with an unknown command byte
    pub frames_ignored: u64,
    /// Connection duration
    pub duration: Duration,
}

impl SessionStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Average inbound rate in bytes/sec
    pub fn byte_rate(&self) -> u64 {
        let millis = self.duration.as_millis() as u64;
        if millis > 0 {
            self.bytes_received * 1000 / millis
        } else {
            0
        }
    }
}

/// Broker-wide counters shared by every connection context
#[derive(Debug, Default)]
pub struct BrokerStats {
    connections_accepted: AtomicU64,
    active_connections: AtomicU64,
    subscriptions: AtomicU64,
    publishes: AtomicU64,
    deliveries: AtomicU64,
    failed_deliveries: AtomicU64,
}

/// Point-in-time copy of [`BrokerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStatsSnapshot {
    /// Connections accepted since start
    pub connections_accepted: u64,
    /// Connections currently open
    pub active_connections: u64,
    /// Subscribe frames processed
    pub subscriptions: u64,
    /// Publish frames processed (broadcast and exclusive)
    pub publishes: u64,
    /// Frames written to subscribers
    pub deliveries: u64,
    /// Writes to subscribers that failed
    pub failed_deliveries: u64,
}

impl BrokerStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_subscription(&self) {
        self.subscriptions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish(&self) {
        self.publishes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery(&self) {
        self.deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_delivery(&self) {
        self.failed_deliveries.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters
    pub fn snapshot(&self) -> BrokerStatsSnapshot {
        BrokerStatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            subscriptions: self.subscriptions.load(Ordering::Relaxed),
            publishes: self.publishes.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            failed_deliveries: self.failed_deliveries.load(Ordering::Relaxed),
        }
    }
}
