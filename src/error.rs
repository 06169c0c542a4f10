//! Process-level error types.
//!
//! Per-request failures never surface here: blocked requests become 403
//! responses and upstream failures become 502 responses inside the handler.
//! Everything in [`ProxyError`] ends the process. Configuration problems are
//! reported earlier, as [`ConfigError`](crate::config::ConfigError).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid concealed pattern '{pattern}': {source}")]
    InvalidRule {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid upstream: {0}")]
    InvalidUpstream(String),

    #[error("Metrics setup failed: {0}")]
    Metrics(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for startup operations.
pub type Result<T> = std::result::Result<T, ProxyError>;
