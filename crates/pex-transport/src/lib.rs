//! PEX Transport - Exchange session transport
//!
//! This crate provides:
//! - Transport credentials (Ed25519 identity attestation)
//! - The dialer seam and its TCP implementation
//! - Session handles (control/receiver split) with close semantics
//! - The accept side of the exchange protocol
//! - An in-memory transport for deterministic tests

pub mod credentials;
pub mod dial;
pub mod listen;
pub mod memory;
pub mod session;
pub mod stream;

pub use credentials::*;
pub use dial::*;
pub use listen::*;
pub use memory::*;
pub use session::*;
pub use stream::*;
