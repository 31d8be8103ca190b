//! PEX Exchange - Membership orchestration
//!
//! This crate implements the membership side of the exchange protocol:
//! - The observer capability the gossip engine pushes events into
//! - The member registry with its atomic per-IP claim
//! - The per-member stream sync worker
//! - The peer metadata aggregator read by downstream peer selection

pub mod aggregator;
pub mod manager;
pub mod observer;
pub mod registry;
mod sync;

pub use aggregator::*;
pub use manager::*;
pub use observer::*;
pub use registry::*;
