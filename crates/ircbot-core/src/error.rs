//! Error types shared across the ircbot crates.
//!
//! Store and configuration errors live next to the code that raises them;
//! this module only covers the connection layer.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur while talking to the IRC server.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connecting to the server failed.
    #[error("connection to {server}:{port} failed: {reason}")]
    ConnectionFailed {
        /// Server host name.
        server: String,
        /// Server port.
        port: u16,
        /// Reason for failure.
        reason: String,
    },

    /// The server closed the connection.
    #[error("connection closed")]
    Closed,

    /// The outbound queue is gone, so nothing more can be sent.
    #[error("outbound queue closed")]
    OutboundClosed,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
