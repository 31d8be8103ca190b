//! Negotiation payload layout
//!
//! Hello and HelloAck frames carry the same payload: the protocol tag,
//! the sender's Ed25519 public key, and a signature over tag plus key.
//! Signing and verification live in the transport layer; this module
//! only defines the byte layout.

use pex_core::{PexError, PexResult};

/// Protocol tag carried in negotiation payloads
pub const PROTOCOL_TAG: &[u8; 5] = b"pex/1";

/// Public key size in bytes (Ed25519)
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Signature size in bytes (Ed25519)
pub const SIGNATURE_SIZE: usize = 64;

/// Total negotiation payload size
pub const HELLO_PAYLOAD_SIZE: usize = PROTOCOL_TAG.len() + PUBLIC_KEY_SIZE + SIGNATURE_SIZE;

/// Negotiation payload carried by Hello and HelloAck frames
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelloPayload {
    /// Sender's Ed25519 public key
    pub public_key: [u8; PUBLIC_KEY_SIZE],
    /// Signature over `PROTOCOL_TAG || public_key`
    pub signature: [u8; SIGNATURE_SIZE],
}

impl HelloPayload {
    /// The message a negotiation signature covers
    pub fn signed_message(public_key: &[u8; PUBLIC_KEY_SIZE]) -> Vec<u8> {
        let mut message = Vec::with_capacity(PROTOCOL_TAG.len() + PUBLIC_KEY_SIZE);
        message.extend_from_slice(PROTOCOL_TAG);
        message.extend_from_slice(public_key);
        message
    }

    /// Parse a negotiation payload from bytes
    pub fn parse(buf: &[u8]) -> PexResult<Self> {
        if buf.len() < HELLO_PAYLOAD_SIZE {
            return Err(PexError::BufferTooShort {
                expected: HELLO_PAYLOAD_SIZE,
                actual: buf.len(),
            });
        }
        if buf.len() > HELLO_PAYLOAD_SIZE {
            return Err(PexError::InvalidWireFormat(
                "Trailing bytes after negotiation payload".into(),
            ));
        }

        if &buf[..PROTOCOL_TAG.len()] != PROTOCOL_TAG {
            return Err(PexError::InvalidWireFormat(
                "Unknown exchange protocol tag".into(),
            ));
        }

        let mut public_key = [0u8; PUBLIC_KEY_SIZE];
        let mut signature = [0u8; SIGNATURE_SIZE];
        let key_start = PROTOCOL_TAG.len();
        public_key.copy_from_slice(&buf[key_start..key_start + PUBLIC_KEY_SIZE]);
        signature.copy_from_slice(&buf[key_start + PUBLIC_KEY_SIZE..]);

        Ok(HelloPayload {
            public_key,
            signature,
        })
    }

    /// Serialize the negotiation payload to bytes
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HELLO_PAYLOAD_SIZE);
        buf.extend_from_slice(PROTOCOL_TAG);
        buf.extend_from_slice(&self.public_key);
        buf.extend_from_slice(&self.signature);
        buf
    }
}
