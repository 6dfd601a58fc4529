//! Fixed 32-byte frame header.
//!
//! Fields are converted field-by-field at the network/host boundary rather
//! than cast through a packed struct: `bitflags`-style or `#[repr(C, packed)]`
//! whole-struct reinterpretation would let an adversarial 32-byte buffer alias
//! directly into `reserved`/`flags` with no validation step, and it hides the
//! conversion points that network byte order actually requires.

use bitflags::bitflags;
use byteorder::{BigEndian, ByteOrder};

use crate::ProtocolError;

/// Size of a frame header on the wire, in bytes.
pub const HEADER_LEN: usize = 32;

/// Discriminates the four call shapes plus the liveness/error frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// A call invocation.
    Request,
    /// The terminal reply to a unary or client-streaming call.
    Response,
    /// One message within an open stream.
    Stream,
    /// A dispatch or handler failure, carrying the originating `request_id`.
    Error,
    /// Liveness probe.
    Ping,
    /// Liveness probe reply, echoing the ping's `request_id`.
    Pong,
}

impl MessageType {
    const fn to_u8(self) -> u8 {
        match self {
            Self::Request => 1,
            Self::Response => 2,
            Self::Stream => 3,
            Self::Error => 4,
            Self::Ping => 5,
            Self::Pong => 6,
        }
    }

    const fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Request),
            2 => Some(Self::Response),
            3 => Some(Self::Stream),
            4 => Some(Self::Error),
            5 => Some(Self::Ping),
            6 => Some(Self::Pong),
            _ => None,
        }
    }
}

bitflags! {
    /// Per-frame bitfield. `STREAM_BEGIN`/`STREAM_END` mark stream lifecycle;
    /// `COMPRESSED`/`ENCRYPTED` are reserved for schema layers above this crate.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u8 {
        /// No flags set.
        const NONE = 0x00;
        /// First frame of a stream.
        const STREAM_BEGIN = 0x01;
        /// Last frame of a stream; the stream is closed after this frame.
        const STREAM_END = 0x02;
        /// Payload is compressed. Opaque to this crate.
        const COMPRESSED = 0x04;
        /// Payload is encrypted. Opaque to this crate.
        const ENCRYPTED = 0x08;
    }
}

/// Fixed 32-byte frame header, host-native representation.
///
/// `message_size` counts the header itself, so a header with no body has
/// `message_size == HEADER_LEN as u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Total frame length, header included.
    pub message_size: u32,
    /// Target service identifier.
    pub service_id: u32,
    /// Target method identifier within the service.
    pub method_id: u32,
    /// Client-assigned identifier, echoed on every frame of the call.
    pub request_id: u32,
    /// 0 for non-stream frames; otherwise the owning stream's id.
    pub stream_id: u32,
    /// Position within a stream; the first STREAM frame is 1.
    pub sequence_number: u32,
    /// Frame kind.
    pub message_type: MessageType,
    /// Stream lifecycle / payload hint bits.
    pub flags: Flags,
}

impl FrameHeader {
    /// Body length implied by `message_size`, or `None` if `message_size`
    /// is smaller than a header (a protocol violation the caller must
    /// reject rather than underflow).
    #[must_use]
    pub fn body_len(&self) -> Option<u32> {
        self.message_size.checked_sub(HEADER_LEN as u32)
    }

    /// Writes the 32-byte wire representation of `self` into `dst`.
    pub fn encode(&self, dst: &mut [u8; HEADER_LEN]) {
        BigEndian::write_u32(&mut dst[0..4], self.message_size);
        BigEndian::write_u32(&mut dst[4..8], self.service_id);
        BigEndian::write_u32(&mut dst[8..12], self.method_id);
        BigEndian::write_u32(&mut dst[12..16], self.request_id);
        BigEndian::write_u32(&mut dst[16..20], self.stream_id);
        BigEndian::write_u32(&mut dst[20..24], self.sequence_number);
        dst[24] = self.message_type.to_u8();
        dst[25] = self.flags.bits();
        BigEndian::write_u16(&mut dst[26..28], 0);
        // bytes 28..32 reserved, must be zero on send
        dst[28..32].fill(0);
    }

    /// Parses a 32-byte wire representation. Rejects unknown message types
    /// and a `message_size` smaller than the header itself; ignores the
    /// reserved field per the wire contract.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownMessageType`] or
    /// [`ProtocolError::UndersizedFrame`].
    pub fn decode(src: &[u8; HEADER_LEN]) -> Result<Self, ProtocolError> {
        let message_size = BigEndian::read_u32(&src[0..4]);
        if (message_size as usize) < HEADER_LEN {
            return Err(ProtocolError::UndersizedFrame { message_size });
        }
        let service_id = BigEndian::read_u32(&src[4..8]);
        let method_id = BigEndian::read_u32(&src[8..12]);
        let request_id = BigEndian::read_u32(&src[12..16]);
        let stream_id = BigEndian::read_u32(&src[16..20]);
        let sequence_number = BigEndian::read_u32(&src[20..24]);
        let message_type = MessageType::from_u8(src[24])
            .ok_or(ProtocolError::UnknownMessageType { raw: src[24], message_size })?;
        let flags = Flags::from_bits_truncate(src[25]);

        Ok(Self {
            message_size,
            service_id,
            method_id,
            request_id,
            stream_id,
            sequence_number,
            message_type,
            flags,
        })
    }
}

const _: () = assert!(HEADER_LEN == 32, "frame header must be exactly 32 bytes");
