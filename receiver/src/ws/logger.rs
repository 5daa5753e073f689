//! Channel event logging.
//!
//! Turns channel lifecycle events into log entries and appends them to a
//! [`LogSink`]. Every event produces exactly one entry.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use super::connection::ChannelEvent;
use super::messages::{LogLine, Payload};
use super::metrics::WsMetrics;

/// Logged when a channel opens.
pub const CONNECTED: &str = "Client connected";

/// Logged when a channel closes.
pub const DISCONNECTED: &str = "Client disconnected";

/// Logged instead of an error when the peer vanishes mid-transfer.
pub const ABRUPT_DISCONNECT: &str =
    "Client disconnected abruptly (likely program upload or power cycle/loss)";

/// Prefix for unexpected channel errors.
pub const ERROR_PREFIX: &str = "WebSocket error:";

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational output.
    Info,
    /// Something went wrong on the channel.
    Error,
}

/// A fully formatted line plus its severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Severity of the entry.
    pub severity: Severity,
    /// Formatted text, without a trailing newline.
    pub text: String,
}

impl LogEntry {
    /// Creates an informational entry.
    #[must_use]
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            text: text.into(),
        }
    }

    /// Creates an error entry.
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            text: text.into(),
        }
    }

    /// Returns true if the entry has error severity.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Destination for formatted log entries.
pub trait LogSink: Send + Sync {
    /// Appends an already formatted entry.
    fn append(&self, entry: &LogEntry);
}

/// Writes informational entries to stdout and errors to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn append(&self, entry: &LogEntry) {
        let result = match entry.severity {
            Severity::Info => writeln!(std::io::stdout().lock(), "{}", entry.text),
            Severity::Error => writeln!(std::io::stderr().lock(), "{}", entry.text),
        };
        if let Err(e) = result {
            tracing::debug!("Failed to write log entry: {}", e);
        }
    }
}

/// Keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every entry appended so far.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of entries appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if nothing has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for MemorySink {
    fn append(&self, entry: &LogEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
    }
}

/// Converts channel events into log entries.
#[derive(Clone)]
pub struct EventLogger {
    sink: Arc<dyn LogSink>,
    metrics: Arc<WsMetrics>,
}

impl EventLogger {
    /// Creates a logger writing to `sink` and counting into `metrics`.
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>, metrics: Arc<WsMetrics>) -> Self {
        Self { sink, metrics }
    }

    /// Returns the metrics this logger records into.
    #[must_use]
    pub fn metrics(&self) -> &Arc<WsMetrics> {
        &self.metrics
    }

    /// Writes a server notice, such as the startup banner, to the sink.
    pub fn announce(&self, text: impl Into<String>) -> LogEntry {
        let entry = LogEntry::info(text);
        self.sink.append(&entry);
        entry
    }

    /// Logs an event and returns the entry that was written.
    pub fn handle(&self, event: &ChannelEvent) -> LogEntry {
        let entry = match event {
            ChannelEvent::Opened => {
                self.metrics.record_connection_opened();
                LogEntry::info(CONNECTED)
            }
            ChannelEvent::Message(text) => {
                self.metrics.record_message_received();
                let payload = Payload::decode(text);
                if payload.is_raw() {
                    self.metrics.record_raw_message();
                }
                LogEntry::info(LogLine::now(payload).to_string())
            }
            ChannelEvent::Closed => {
                self.metrics.record_connection_closed();
                LogEntry::info(DISCONNECTED)
            }
            // Peers routinely vanish mid-upload or on power loss.
            ChannelEvent::Error(err) if err.is_abrupt_disconnect() => {
                self.metrics.record_abrupt_disconnect();
                LogEntry::info(ABRUPT_DISCONNECT)
            }
            ChannelEvent::Error(err) => {
                self.metrics.record_error();
                LogEntry::error(format!("{} {}", ERROR_PREFIX, err))
            }
        };
        self.sink.append(&entry);
        entry
    }
}

impl std::fmt::Debug for EventLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogger")
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::connection::ChannelError;

    fn logger() -> (EventLogger, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let logger = EventLogger::new(
            Arc::clone(&sink) as Arc<dyn LogSink>,
            Arc::new(WsMetrics::new()),
        );
        (logger, sink)
    }

    fn message(text: &str) -> ChannelEvent {
        ChannelEvent::Message(text.to_string())
    }

    #[test]
    fn test_opened_logs_connected() {
        let (logger, sink) = logger();
        logger.handle(&ChannelEvent::Opened);
        assert_eq!(sink.entries(), vec![LogEntry::info(CONNECTED)]);
        assert_eq!(logger.metrics().connections_opened(), 1);
    }

    #[test]
    fn test_announce_bypasses_metrics() {
        let (logger, sink) = logger();
        let entry = logger.announce("WebSocket server listening on ws://127.0.0.1:8080");
        assert_eq!(sink.entries(), vec![entry]);
        assert_eq!(logger.metrics().connections_opened(), 0);
        assert_eq!(logger.metrics().messages_received(), 0);
    }

    #[test]
    fn test_closed_logs_disconnected() {
        let (logger, sink) = logger();
        logger.handle(&ChannelEvent::Closed);
        assert_eq!(sink.entries(), vec![LogEntry::info(DISCONNECTED)]);
    }

    #[test]
    fn test_message_structured() {
        let (logger, _sink) = logger();
        let entry = logger.handle(&message(r#"{"level":"warn","message":"low battery"}"#));
        assert_eq!(entry.severity, Severity::Info);
        assert!(entry.text.starts_with('['));
        assert!(entry.text.ends_with("] WARN: low battery"));
        assert_eq!(logger.metrics().raw_messages(), 0);
    }

    #[test]
    fn test_message_raw() {
        let (logger, _sink) = logger();
        let entry = logger.handle(&message("hello world"));
        assert!(entry.text.ends_with("] RAW: hello world"));
        assert!(!entry.is_error());
        assert_eq!(logger.metrics().raw_messages(), 1);
    }

    #[test]
    fn test_message_timestamp_format() {
        let (logger, _sink) = logger();
        let entry = logger.handle(&message("x"));
        let end = entry.text.find(']').expect("closing bracket");
        let stamp = entry.text.get(1..end).expect("timestamp");
        assert_eq!(stamp.len(), "2024-03-01T12:30:45.000Z".len());
        assert!(stamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
    }

    #[test]
    fn test_unexpected_eof_is_info() {
        let (logger, _sink) = logger();
        let entry = logger.handle(&ChannelEvent::Error(ChannelError::new("Unexpected EOF")));
        assert_eq!(entry, LogEntry::info(ABRUPT_DISCONNECT));
        assert_eq!(logger.metrics().abrupt_disconnects(), 1);
        assert_eq!(logger.metrics().errors(), 0);
    }

    #[test]
    fn test_other_error_is_error() {
        let (logger, _sink) = logger();
        let entry = logger.handle(&ChannelEvent::Error(ChannelError::new(
            "Invalid frame header",
        )));
        assert!(entry.is_error());
        assert_eq!(entry.text, "WebSocket error: Invalid frame header");
        assert_eq!(logger.metrics().errors(), 1);
    }

    #[test]
    fn test_one_entry_per_event() {
        let (logger, sink) = logger();
        let events = [
            ChannelEvent::Opened,
            message("a"),
            message(r#"{"message":"b"}"#),
            ChannelEvent::Error(ChannelError::new("Unexpected EOF")),
            ChannelEvent::Closed,
        ];
        for event in &events {
            logger.handle(event);
        }
        assert_eq!(sink.len(), events.len());
    }

    #[test]
    fn test_severity_serialize() {
        let json = serde_json::to_string(&LogEntry::error("boom")).expect("serialize");
        assert_eq!(json, r#"{"severity":"error","text":"boom"}"#);
    }

    #[test]
    fn test_memory_sink_empty() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
    }
}
