//! Membership event observer
//!
//! The gossip engine owns propagation and failure detection; it pushes
//! per-node notifications into whatever observer the embedding process
//! injects. [`crate::ExchangeMemberManager`] is the production observer.

use pex_core::NodeAnnouncement;

/// Push-style membership notifications from the external gossip engine
pub trait MembershipObserver: Send + Sync {
    /// A node joined the mesh
    fn on_join(&self, node: NodeAnnouncement);

    /// A node left the mesh
    fn on_leave(&self, node: NodeAnnouncement);

    /// A node's announced metadata changed
    fn on_update(&self, node: NodeAnnouncement);
}
