//! Protocol-level errors: malformed headers and frames.

use thiserror::Error;

/// Errors produced while decoding the wire format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// `message_size` claimed less than [`crate::HEADER_LEN`] bytes.
    #[error("frame message_size {message_size} is smaller than the header itself")]
    UndersizedFrame {
        /// The offending `message_size` field.
        message_size: u32,
    },

    /// The `message_type` byte did not match any known variant. The frame
    /// is still self-delimiting (`message_size` parsed fine), so a caller
    /// can skip exactly this frame and keep reading rather than treating it
    /// as a framing failure.
    #[error("unknown message_type byte {raw:#04x}")]
    UnknownMessageType {
        /// The raw, unrecognized byte.
        raw: u8,
        /// The frame's declared total length, header included.
        message_size: u32,
    },

    /// A frame's body length did not match `message_size - HEADER_LEN`.
    #[error("body length {actual} does not match header-declared length {expected}")]
    BodyLengthMismatch {
        /// Length implied by the header.
        expected: u32,
        /// Length actually supplied.
        actual: u32,
    },
}
