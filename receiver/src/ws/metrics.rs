//! WebSocket metrics tracking.
//!
//! Provides atomic counters for monitoring the receiver.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Metrics for the WebSocket receiver.
#[derive(Debug)]
pub struct WsMetrics {
    /// Total connections opened.
    connections_opened: AtomicU64,

    /// Total connections closed.
    connections_closed: AtomicU64,

    /// Total messages received.
    messages_received: AtomicU64,

    /// Messages that fell back to raw logging.
    raw_messages: AtomicU64,

    /// Abrupt disconnects downgraded to informational entries.
    abrupt_disconnects: AtomicU64,

    /// Unexpected channel errors.
    errors: AtomicU64,

    /// Start time for rate calculation.
    start_time: Instant,
}

impl Default for WsMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl WsMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections_opened: AtomicU64::new(0),
            connections_closed: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            raw_messages: AtomicU64::new(0),
            abrupt_disconnects: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records a connection opened.
    pub fn record_connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a connection closed.
    pub fn record_connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a message received.
    pub fn record_message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a message logged under the raw tag.
    pub fn record_raw_message(&self) {
        self.raw_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an abrupt disconnect.
    pub fn record_abrupt_disconnect(&self) {
        self.abrupt_disconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an error.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the total connections opened.
    #[must_use]
    pub fn connections_opened(&self) -> u64 {
        self.connections_opened.load(Ordering::Relaxed)
    }

    /// Returns the total connections closed.
    #[must_use]
    pub fn connections_closed(&self) -> u64 {
        self.connections_closed.load(Ordering::Relaxed)
    }

    /// Returns the current active connections.
    #[must_use]
    pub fn active_connections(&self) -> u64 {
        self.connections_opened()
            .saturating_sub(self.connections_closed())
    }

    /// Returns the total messages received.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Returns the messages logged under the raw tag.
    #[must_use]
    pub fn raw_messages(&self) -> u64 {
        self.raw_messages.load(Ordering::Relaxed)
    }

    /// Returns the abrupt disconnects.
    #[must_use]
    pub fn abrupt_disconnects(&self) -> u64 {
        self.abrupt_disconnects.load(Ordering::Relaxed)
    }

    /// Returns the total errors.
    #[must_use]
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Returns the uptime.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> WsMetricsSnapshot {
        WsMetricsSnapshot {
            connections_opened: self.connections_opened(),
            connections_closed: self.connections_closed(),
            active_connections: self.active_connections(),
            messages_received: self.messages_received(),
            raw_messages: self.raw_messages(),
            abrupt_disconnects: self.abrupt_disconnects(),
            errors: self.errors(),
            uptime: self.uptime(),
        }
    }
}

/// A point-in-time snapshot of WebSocket metrics.
#[derive(Debug, Clone)]
pub struct WsMetricsSnapshot {
    /// Total connections opened.
    pub connections_opened: u64,
    /// Total connections closed.
    pub connections_closed: u64,
    /// Active connections.
    pub active_connections: u64,
    /// Messages received.
    pub messages_received: u64,
    /// Messages logged under the raw tag.
    pub raw_messages: u64,
    /// Abrupt disconnects.
    pub abrupt_disconnects: u64,
    /// Unexpected errors.
    pub errors: u64,
    /// Uptime.
    pub uptime: Duration,
}
