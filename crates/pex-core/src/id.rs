//! Identity types for the PEX protocol
//!
//! Node identifiers are 64-bit fingerprints derived from transport
//! credentials, compact enough for logs and handshake frames.

use std::fmt;

/// Node identity - cryptographic fingerprint (truncated hash of public key)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeId(pub u64);

impl NodeId {
    pub const ZERO: NodeId = NodeId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        NodeId(id)
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        NodeId(u64::from_le_bytes(bytes))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({:016x})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
