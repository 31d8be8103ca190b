//! Complete frame structure for the PEX exchange stream
//!
//! Frame = Header + Payload. The transport layer prefixes each serialized
//! frame with its u32 LE length when writing to a byte stream.

use bytes::Bytes;

use pex_core::{PexError, PexResult};

use crate::{FrameHeader, FrameKind, FRAME_HEADER_SIZE};

/// Maximum payload size (64 KiB)
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Maximum serialized frame size
pub const MAX_FRAME_SIZE: usize = FRAME_HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// A complete exchange frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Frame kind
    pub kind: FrameKind,
    /// Opaque payload
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame with an empty payload
    pub fn new(kind: FrameKind) -> Self {
        Frame {
            kind,
            payload: Bytes::new(),
        }
    }

    /// Create a frame carrying `payload`
    pub fn with_payload(kind: FrameKind, payload: impl Into<Bytes>) -> Self {
        Frame {
            kind,
            payload: payload.into(),
        }
    }

    /// Create a metadata frame
    pub fn metadata(payload: impl Into<Bytes>) -> Self {
        Frame::with_payload(FrameKind::Metadata, payload)
    }

    /// Parse a frame from bytes
    pub fn parse(buf: &[u8]) -> PexResult<Self> {
        let header = FrameHeader::parse(buf)?;

        let expected = FRAME_HEADER_SIZE + header.payload_len as usize;
        if buf.len() < expected {
            return Err(PexError::BufferTooShort {
                expected,
                actual: buf.len(),
            });
        }
        if buf.len() > expected {
            return Err(PexError::InvalidWireFormat(format!(
                "Trailing bytes after payload: {} > {}",
                buf.len(),
                expected
            )));
        }

        Ok(Frame {
            kind: header.kind,
            payload: Bytes::copy_from_slice(&buf[FRAME_HEADER_SIZE..]),
        })
    }

    /// Serialize the frame to bytes
    pub fn serialize(&self) -> PexResult<Vec<u8>> {
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(PexError::InvalidWireFormat(format!(
                "Payload too large: {} > {}",
                self.payload.len(),
                MAX_PAYLOAD_SIZE
            )));
        }

        let header = FrameHeader::new(self.kind, self.payload.len() as u32);
        let mut buf = vec![0u8; FRAME_HEADER_SIZE + self.payload.len()];
        header.serialize(&mut buf)?;
        buf[FRAME_HEADER_SIZE..].copy_from_slice(&self.payload);

        Ok(buf)
    }

    /// Total serialized size
    pub fn size(&self) -> usize {
        FRAME_HEADER_SIZE + self.payload.len()
    }
}
