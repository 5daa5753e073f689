//! WebSocket module for receiving device logs.
//!
//! Accepts WebSocket upgrades and turns every channel event into exactly one
//! log entry.
//!
//! # Events
//!
//! - open — `Client connected`
//! - message — `[timestamp] LEVEL: message`, or `[timestamp] RAW: payload`
//! - close — `Client disconnected`
//! - error — an error entry, unless the peer simply vanished
//!
//! # Message Format
//!
//! - `{"level": "...", "message": "..."}` — both fields optional
//! - anything else — logged verbatim under the `RAW` tag

pub mod connection;
pub mod handler;
pub mod logger;
pub mod messages;
pub mod metrics;

pub use connection::{ChannelError, ChannelErrorKind, ChannelEvent, ConnectionState};
pub use handler::{accept, drive_connection, WsState, NOT_A_WEBSOCKET_REQUEST};
pub use logger::{ConsoleSink, EventLogger, LogEntry, LogSink, MemorySink, Severity};
pub use messages::{ClientMessage, LogLine, Payload};
pub use metrics::WsMetrics;
