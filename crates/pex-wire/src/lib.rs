//! PEX Wire - Exchange stream framing
//!
//! The exchange channel runs over a reliable byte stream as
//! length-delimited frames:
//!
//! ```text
//! u32 LE frame length | header (8 bytes) | payload
//! ```
//!
//! This crate defines the frame header, the frame codec, and the byte
//! layout of the negotiation (Hello/HelloAck) payload. Metadata payloads
//! stay opaque at this layer.

pub mod frame;
pub mod handshake;
pub mod header;

pub use frame::*;
pub use handshake::*;
pub use header::*;
