//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that end a bot run.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The server could not be reached or the connection broke.
    #[error("Transport error: {0}")]
    Transport(#[from] ircbot_core::TransportError),

    /// Signal handlers could not be installed.
    #[error("Failed to subscribe to signals: {0}")]
    Signals(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
