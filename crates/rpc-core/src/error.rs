//! Errors shared by the transport-agnostic core primitives.

use thiserror::Error;

pub use crate::pool::PoolError;

/// Errors raised by core primitives (pool, registry, framing) independent of
/// any particular transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Wraps a [`PoolError`] from [`crate::pool::WorkerPool`].
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Wraps a [`rpc_proto::ProtocolError`] surfaced while parsing frames.
    #[error(transparent)]
    Protocol(#[from] rpc_proto::ProtocolError),

    /// A STREAM frame referenced a `stream_id` with no open record. Not
    /// fatal to the connection: logged and dropped.
    #[error("stream {stream_id} is not open")]
    UnknownStream {
        /// The unrecognized stream id.
        stream_id: u32,
    },
}
