//! Server error types.

use thiserror::Error;

/// Errors that can occur binding or running the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid bind address or other startup misconfiguration. Fatal.
    #[error("configuration error: {0}")]
    Config(String),

    /// Underlying socket I/O failure.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}
