//! PEX Test Harness - scripted peers and end-to-end exchange validation
//!
//! This crate provides:
//! - Mock remote peers serving the exchange protocol over real sockets
//! - End-to-end membership scenario tests (see `tests/`)

pub mod mock_peer;

pub use mock_peer::*;
