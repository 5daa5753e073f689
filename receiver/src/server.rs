//! HTTP server.
//!
//! Binds the listener and hands every request, whatever its path, to the
//! WebSocket acceptor.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::ws::{accept, EventLogger, LogEntry, LogSink, WsState};

/// The log receiver server.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    state: WsState,
}

impl Server {
    /// Creates a server that writes classified entries to `sink`.
    #[must_use]
    pub fn new(config: ServerConfig, sink: Arc<dyn LogSink>) -> Self {
        Self {
            config,
            state: WsState::new(sink),
        }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the shared WebSocket state.
    #[must_use]
    pub fn state(&self) -> &WsState {
        &self.state
    }

    /// Builds the router.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(accept)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Binds the listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the address cannot
    /// be bound.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        self.config.validate()?;

        let address = self.config.address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind { address, source })?;

        Ok(BoundServer {
            router: self.router(),
            listener,
            logger: self.state.logger,
        })
    }

    /// Runs the server until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if binding or serving fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let bound = self.bind().await?;
        bound.announce()?;
        bound.serve(shutdown_signal()).await
    }
}

/// Returns the startup banner for a listener bound to `addr`.
#[must_use]
pub fn listening_banner(addr: SocketAddr) -> String {
    format!("WebSocket server listening on ws://{}", addr)
}

/// A server whose listener is bound but not yet accepting.
#[derive(Debug)]
pub struct BoundServer {
    router: Router,
    listener: TcpListener,
    logger: EventLogger,
}

impl BoundServer {
    /// Returns the bound address.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::Serve)
    }

    /// Writes the startup banner to the log sink.
    ///
    /// The banner goes through the sink rather than `tracing`, so it is
    /// printed whatever `RUST_LOG` says.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn announce(&self) -> Result<LogEntry, ServerError> {
        let addr = self.local_addr()?;
        Ok(self.logger.announce(listening_banner(addr)))
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the accept loop fails.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        debug!("Accepting connections on {}", addr);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ServerError::Serve)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down WebSocket server");
}
