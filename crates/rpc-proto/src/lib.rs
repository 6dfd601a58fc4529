//! Wire types for the RPC transport.
//!
//! This crate has no I/O and no threading: it is the pure data layer shared
//! by `rpc-core`, `rpc-server`, and `rpc-client` — the fixed 32-byte frame
//! header, the message-type/flags vocabulary, and the `Frame` that combines
//! them with a body.

mod error;
mod frame;
mod header;

pub use error::ProtocolError;
pub use frame::Frame;
pub use header::{Flags, HEADER_LEN, MessageType, FrameHeader};
