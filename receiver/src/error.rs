//! Server error types.

use std::io;

use crate::config::ConfigError;

/// Errors that stop the receiver from starting or serving.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Could not bind the listener.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Address that was requested.
        address: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The accept loop failed.
    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}
