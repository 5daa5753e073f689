//! wslog receiver - WebSocket log sink for devices under development.
//!
//! Devices (or test harnesses) open a WebSocket and stream status lines,
//! typically while a firmware or program upload is in progress. Each line is
//! classified, timestamped and written to a [`ws::LogSink`].
//!
//! # Components
//!
//! - [`config`]: Bind address configuration
//! - [`server`]: Listener and router
//! - [`ws`]: Upgrade handling, event logging and message classification
//! - [`error`]: Server errors

pub mod config;
pub mod error;
pub mod server;
pub mod ws;

pub use config::{ConfigError, ServerConfig};
pub use error::ServerError;
pub use server::{BoundServer, Server};
pub use ws::{ConsoleSink, LogEntry, LogSink, MemorySink, Severity};
