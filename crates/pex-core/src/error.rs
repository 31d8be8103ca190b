//! Error types for the PEX protocol

use thiserror::Error;

/// Core PEX errors
#[derive(Error, Debug)]
pub enum PexError {
    // Wire errors
    #[error("Invalid wire format: {0}")]
    InvalidWireFormat(String),

    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Unknown frame kind: {0}")]
    UnknownFrameKind(u8),

    // Membership errors
    #[error("Invalid member metadata: {0}")]
    InvalidMetadata(String),

    #[error("Invalid member address: {0}")]
    AddressFormat(String),

    #[error("Member {0} is already registered")]
    AlreadyRegistered(String),

    // Connection setup errors
    #[error("Failed to dial {addr}: {reason}")]
    DialFailed { addr: String, reason: String },

    #[error("Failed to negotiate exchange stream with {addr}: {reason}")]
    StreamNegotiation { addr: String, reason: String },

    #[error("Handshake rejected: {0}")]
    HandshakeRejected(String),

    // Stream errors
    #[error("Exchange stream closed by remote")]
    StreamClosed,

    #[error("Stream receive error: {0}")]
    StreamReceive(String),

    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type for PEX operations
pub type PexResult<T> = Result<T, PexError>;
