//! WebSocket connection state management.
//!
//! Models the events a channel produces and the lifecycle they drive.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Description some transports give when the peer vanishes mid-frame.
pub const UNEXPECTED_EOF: &str = "Unexpected EOF";

/// Text of the WebSocket protocol error raised when a peer drops the TCP
/// connection without sending a close frame.
const RESET_WITHOUT_CLOSE: &str = "Connection reset without closing handshake";

/// Structural classification of a channel error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelErrorKind {
    /// The peer went away without a closing handshake.
    AbruptDisconnect,
    /// Anything else.
    Other,
}

/// Error reported on an open channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelError {
    description: String,
    kind: ChannelErrorKind,
}

impl ChannelError {
    /// Creates an error from its description alone.
    ///
    /// Only the literal [`UNEXPECTED_EOF`] description is recognised as an
    /// abrupt disconnect.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        let description = description.into();
        let kind = if description == UNEXPECTED_EOF {
            ChannelErrorKind::AbruptDisconnect
        } else {
            ChannelErrorKind::Other
        };
        Self { description, kind }
    }

    /// Creates an error from a transport error, inspecting its source chain.
    #[must_use]
    pub fn from_transport(err: &(dyn StdError + 'static)) -> Self {
        let mut error = Self::new(err.to_string());
        if is_abrupt_disconnect(err) {
            error.kind = ChannelErrorKind::AbruptDisconnect;
        }
        error
    }

    /// Returns the error description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ChannelErrorKind {
        self.kind
    }

    /// Returns true if the error is the expected abrupt-disconnect condition.
    #[must_use]
    pub fn is_abrupt_disconnect(&self) -> bool {
        self.kind == ChannelErrorKind::AbruptDisconnect
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

impl From<axum::Error> for ChannelError {
    fn from(err: axum::Error) -> Self {
        Self::from_transport(&err)
    }
}

/// Walks an error's source chain looking for a vanished peer.
fn is_abrupt_disconnect(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        let text = e.to_string();
        if text == UNEXPECTED_EOF || text.contains(RESET_WITHOUT_CLOSE) {
            return true;
        }
        current = e.source();
    }
    false
}

/// An event observed on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The upgrade completed.
    Opened,
    /// A text payload arrived.
    Message(String),
    /// The channel closed.
    Closed,
    /// The channel reported an error.
    Error(ChannelError),
}

/// Lifecycle of a single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Upgraded, nothing received yet.
    #[default]
    Open,
    /// At least one message received.
    Receiving,
    /// An error was reported; a close may still follow.
    Errored,
    /// Closed; no further events are expected.
    Closed,
}

impl ConnectionState {
    /// Returns the state after observing `event`.
    ///
    /// A malformed message never moves the connection to `Errored`; only
    /// transport errors do.
    #[must_use]
    pub fn on_event(self, event: &ChannelEvent) -> Self {
        match (self, event) {
            (Self::Closed, _) => Self::Closed,
            (_, ChannelEvent::Closed) => Self::Closed,
            (_, ChannelEvent::Error(_)) => Self::Errored,
            (Self::Open | Self::Receiving, ChannelEvent::Message(_)) => Self::Receiving,
            (state, _) => state,
        }
    }

    /// Returns true once the connection has closed.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}
