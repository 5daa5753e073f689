//! wslog receiver binary.
//!
//! Entry point for the WebSocket log receiver.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wslog_receiver::{ConsoleSink, Server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wslog_receiver=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env()?;

    tracing::info!(
        "Starting wslog receiver on {}:{}",
        config.host,
        config.port
    );

    let server = Server::new(config, Arc::new(ConsoleSink));
    server.run().await?;

    Ok(())
}
