//! Client error types.

use thiserror::Error;

/// Errors that can occur connecting or making a call.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Underlying socket I/O failure.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A received frame failed to decode.
    #[error("protocol error: {0}")]
    Protocol(#[from] rpc_proto::ProtocolError),

    /// The peer closed the connection before a complete reply arrived.
    #[error("connection closed before a complete reply was received")]
    ConnectionClosed,

    /// The peer returned an ERROR frame for this call.
    #[error("remote error (request_id={request_id}): {message}")]
    Remote {
        /// The call's `request_id`.
        request_id: u32,
        /// The error frame's body, interpreted as UTF-8 lossily.
        message: String,
    },

    /// A frame arrived out of the sequence the client expected.
    #[error("unexpected frame: {0}")]
    UnexpectedFrame(String),
}
