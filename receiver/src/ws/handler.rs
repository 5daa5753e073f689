//! WebSocket connection handler.
//!
//! Provides the upgrade handler and the per-connection event loop.

use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::{Stream, StreamExt};
use tracing::debug;

use super::connection::{ChannelError, ChannelEvent, ConnectionState};
use super::logger::{EventLogger, LogSink};
use super::metrics::WsMetrics;

/// Body returned for requests that do not ask for a WebSocket upgrade.
pub const NOT_A_WEBSOCKET_REQUEST: &str = "Not a WebSocket request";

/// WebSocket state shared across connections.
#[derive(Clone, Debug)]
pub struct WsState {
    /// Event logger attached to every channel.
    pub logger: EventLogger,
}

impl WsState {
    /// Creates a new WebSocket state writing to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            logger: EventLogger::new(sink, Arc::new(WsMetrics::new())),
        }
    }

    /// Returns the receiver metrics.
    #[must_use]
    pub fn metrics(&self) -> &Arc<WsMetrics> {
        self.logger.metrics()
    }
}

/// Returns true if the request asks for a WebSocket upgrade.
#[must_use]
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("websocket"))
}

/// WebSocket upgrade handler.
///
/// Requests without `upgrade: websocket` get a 400. Upgrade requests the
/// transport cannot complete get the transport's own rejection.
pub async fn accept(
    State(state): State<WsState>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if !is_upgrade_request(&headers) {
        return (StatusCode::BAD_REQUEST, NOT_A_WEBSOCKET_REQUEST).into_response();
    }

    match upgrade {
        // The callback is registered before the 101 goes out, and frames
        // that arrive early are buffered by the socket until it runs.
        Ok(ws) => ws.on_upgrade(move |socket| handle_connection(socket, state)),
        Err(rejection) => {
            debug!("Upgrade rejected by transport: {}", rejection);
            rejection.into_response()
        }
    }
}

/// Handles an upgraded WebSocket connection.
async fn handle_connection(socket: WebSocket, state: WsState) {
    let final_state = drive_connection(socket, &state.logger).await;
    debug!(
        state = ?final_state,
        metrics = ?state.metrics().snapshot(),
        "WebSocket connection finished"
    );
}

/// Runs a channel's event stream through the logger until it ends.
///
/// Logs exactly one entry per event: the open, each data frame, at most one
/// error, and a final close.
pub async fn drive_connection<S>(stream: S, logger: &EventLogger) -> ConnectionState
where
    S: Stream<Item = Result<Message, axum::Error>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut state = dispatch(logger, ConnectionState::default(), ChannelEvent::Opened);

    while let Some(result) = stream.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                let err = ChannelError::from(e);
                state = dispatch(logger, state, ChannelEvent::Error(err));
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                let text = text.as_str().to_owned();
                state = dispatch(logger, state, ChannelEvent::Message(text));
            }
            Message::Binary(data) => {
                let text = String::from_utf8_lossy(&data).into_owned();
                state = dispatch(logger, state, ChannelEvent::Message(text));
            }
            Message::Ping(_) => {
                debug!("Received ping");
            }
            Message::Pong(_) => {
                debug!("Received pong");
            }
            Message::Close(frame) => {
                debug!("WebSocket close requested: {:?}", frame);
                break;
            }
        }
    }

    dispatch(logger, state, ChannelEvent::Closed)
}

fn dispatch(
    logger: &EventLogger,
    state: ConnectionState,
    event: ChannelEvent,
) -> ConnectionState {
    logger.handle(&event);
    state.on_event(&event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::logger::{LogEntry, MemorySink, ABRUPT_DISCONNECT, CONNECTED, DISCONNECTED};
    use axum::http::HeaderValue;
    use std::io;
    use std::sync::Mutex;

    /// Collects formatted `tracing` output.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            let buf = self.0.lock().expect("capture lock");
            String::from_utf8_lossy(&buf).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("capture lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn ws_state() -> (WsState, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (WsState::new(Arc::clone(&sink) as Arc<dyn LogSink>), sink)
    }

    type Frame = Result<Message, axum::Error>;

    fn text(payload: &str) -> Frame {
        Ok(Message::Text(payload.into()))
    }

    fn frames(items: Vec<Frame>) -> futures::stream::Iter<std::vec::IntoIter<Frame>> {
        futures::stream::iter(items)
    }

    #[test]
    fn test_is_upgrade_request() {
        let mut headers = HeaderMap::new();
        assert!(!is_upgrade_request(&headers));

        headers.insert(header::UPGRADE, HeaderValue::from_static("WebSocket"));
        assert!(is_upgrade_request(&headers));

        headers.insert(header::UPGRADE, HeaderValue::from_static("h2c"));
        assert!(!is_upgrade_request(&headers));
    }

    #[tokio::test]
    async fn test_drive_connection_scenario() {
        let (state, sink) = ws_state();
        let stream = frames(vec![
            text(r#"{"level":"warn","message":"low battery"}"#),
            Ok(Message::Close(None)),
        ]);

        let final_state = drive_connection(stream, &state.logger).await;

        assert!(final_state.is_closed());
        let entries = sink.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries.first(), Some(&LogEntry::info(CONNECTED)));
        assert!(entries
            .get(1)
            .is_some_and(|e| e.text.ends_with("] WARN: low battery")));
        assert_eq!(entries.get(2), Some(&LogEntry::info(DISCONNECTED)));
    }

    #[tokio::test]
    async fn test_drive_connection_ignores_control_frames() {
        let (state, sink) = ws_state();
        let stream = frames(vec![
            Ok(Message::Ping(Vec::new().into())),
            Ok(Message::Pong(Vec::new().into())),
        ]);

        drive_connection(stream, &state.logger).await;

        assert_eq!(sink.len(), 2);
        assert_eq!(state.metrics().messages_received(), 0);
    }

    #[tokio::test]
    async fn test_drive_connection_binary_frame() {
        let (state, sink) = ws_state();
        let stream = frames(vec![Ok(Message::Binary(
            b"boot ok".to_vec().into(),
        ))]);

        drive_connection(stream, &state.logger).await;

        assert!(sink
            .entries()
            .get(1)
            .is_some_and(|e| e.text.ends_with("] RAW: boot ok")));
    }

    #[tokio::test]
    async fn test_drive_connection_abrupt_disconnect() {
        let (state, sink) = ws_state();
        let stream = frames(vec![
            text("flashing"),
            Err(axum::Error::new(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ))),
            text("never seen"),
        ]);

        let final_state = drive_connection(stream, &state.logger).await;

        assert!(final_state.is_closed());
        let entries = sink.entries();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries.get(2), Some(&LogEntry::info(ABRUPT_DISCONNECT)));
        assert!(entries.iter().all(|e| !e.is_error()));
        assert_eq!(state.metrics().abrupt_disconnects(), 1);
    }

    #[tokio::test]
    async fn test_abrupt_disconnect_emits_no_warning() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (state, sink) = ws_state();
        let stream = frames(vec![Err(axum::Error::new(io::Error::other(
            "WebSocket protocol error: Connection reset without closing handshake",
        )))]);

        drive_connection(stream, &state.logger).await;

        let output = logs.contents();
        assert!(!output.contains("WARN"), "unexpected warning: {output}");
        assert!(!output.contains("ERROR"), "unexpected error: {output}");
        assert_eq!(
            sink.entries(),
            vec![
                LogEntry::info(CONNECTED),
                LogEntry::info(ABRUPT_DISCONNECT),
                LogEntry::info(DISCONNECTED),
            ]
        );
    }

    #[tokio::test]
    async fn test_drive_connection_unexpected_error() {
        let (state, sink) = ws_state();
        let stream = frames(vec![Err(axum::Error::new(io::Error::new(
            io::ErrorKind::InvalidData,
            "invalid frame",
        )))]);

        drive_connection(stream, &state.logger).await;

        let entries = sink.entries();
        assert_eq!(entries.len(), 3);
        assert!(entries
            .get(1)
            .is_some_and(|e| e.is_error() && e.text.contains("invalid frame")));
        assert_eq!(entries.get(2), Some(&LogEntry::info(DISCONNECTED)));
        assert_eq!(state.metrics().errors(), 1);
    }

    #[tokio::test]
    async fn test_drive_connection_stream_end_logs_close() {
        let (state, sink) = ws_state();
        let stream = frames(Vec::new());

        drive_connection(stream, &state.logger).await;

        assert_eq!(
            sink.entries(),
            vec![LogEntry::info(CONNECTED), LogEntry::info(DISCONNECTED)]
        );
        assert_eq!(state.metrics().active_connections(), 0);
    }
}
