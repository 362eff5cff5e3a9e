//! Error types for the coordinator and miners
//!
//! Initialisation failures (channels, identifiers, configuration) surface as
//! [`Error`]. Rejected submissions are not errors; see
//! [`crate::coordinator::Rejection`].

use thiserror::Error;

/// Result type alias for mtacoin operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel creation, open or transfer failures
    #[error("Channel error: {0}")]
    Channel(String),

    /// Malformed protocol content
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Every identifier in the worker pool is taken
    #[error("No available worker identifiers (pool size {pool_size})")]
    IdentifiersExhausted {
        /// Size of the identifier pool that was searched
        pool_size: u32,
    },

    /// Miner runtime errors
    #[error("Worker error: {0}")]
    Worker(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a channel error
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::Channel(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a worker error
    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }

    /// Error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Channel(_) => "channel",
            Error::Protocol(_) => "protocol",
            Error::IdentifiersExhausted { .. } => "identifiers",
            Error::Worker(_) => "worker",
        }
    }
}
