//! Frame type combining a [`FrameHeader`] with its body.

use bytes::Bytes;

use crate::{Flags, FrameHeader, MessageType, ProtocolError, header::HEADER_LEN};

/// A complete protocol frame: header plus body.
///
/// The wire layout is exactly `[32-byte header][body bytes]` with no other
/// delimiter; `header.message_size` is the only length information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The frame's header. `message_size` is always consistent with
    /// `body.len()`.
    pub header: FrameHeader,
    /// The frame's body, opaque to this crate.
    pub body: Bytes,
}

impl Frame {
    /// Builds a frame, computing `message_size` from `body`'s length.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        message_type: MessageType,
        flags: Flags,
        service_id: u32,
        method_id: u32,
        request_id: u32,
        stream_id: u32,
        sequence_number: u32,
        body: Bytes,
    ) -> Self {
        let header = FrameHeader {
            message_size: HEADER_LEN as u32 + body.len() as u32,
            service_id,
            method_id,
            request_id,
            stream_id,
            sequence_number,
            message_type,
            flags,
        };
        Self { header, body }
    }

    /// Encodes header and body into a single contiguous buffer.
    ///
    /// This is the simple body-then-header path used for standalone
    /// encoding (e.g. by the client); the session's write path instead
    /// builds the body first and prepends the header into a `FrameBuffer`'s
    /// headroom (see `rpc-core::buffer`), matching the spec's "header codec"
    /// contract.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.body.len());
        let mut header_bytes = [0u8; HEADER_LEN];
        self.header.encode(&mut header_bytes);
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&self.body);
        out
    }

    /// Decodes a frame from a buffer holding exactly one complete frame's
    /// worth of bytes (header plus body, no trailing data).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UndersizedFrame`] if `src` is shorter than a
    /// header, and [`ProtocolError::BodyLengthMismatch`] if the remaining
    /// bytes don't match the header's declared length.
    pub fn decode(src: &[u8]) -> Result<Self, ProtocolError> {
        if src.len() < HEADER_LEN {
            return Err(ProtocolError::UndersizedFrame { message_size: src.len() as u32 });
        }
        let mut header_bytes = [0u8; HEADER_LEN];
        header_bytes.copy_from_slice(&src[..HEADER_LEN]);
        let header = FrameHeader::decode(&header_bytes)?;

        let expected_body_len = header.body_len().ok_or(ProtocolError::UndersizedFrame {
            message_size: header.message_size,
        })?;
        let actual_body_len = (src.len() - HEADER_LEN) as u32;
        if expected_body_len != actual_body_len {
            return Err(ProtocolError::BodyLengthMismatch {
                expected: expected_body_len,
                actual: actual_body_len,
            });
        }

        Ok(Self { header, body: Bytes::copy_from_slice(&src[HEADER_LEN..]) })
    }
}
