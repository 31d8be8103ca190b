//! Membership announcements and exchanged metadata records

use bytes::Bytes;

/// A node identity as reported by the gossip membership engine.
///
/// `addr` is the network address the engine observed the node under and may
/// carry the gossip port; `meta` is the opaque metadata blob the node
/// announced alongside it. Announcements are transient: each one is consumed
/// exactly once by the metadata extractor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeAnnouncement {
    /// Gossip-reported network address
    pub addr: String,
    /// Opaque announced metadata
    pub meta: Bytes,
}

impl NodeAnnouncement {
    pub fn new(addr: impl Into<String>, meta: impl Into<Bytes>) -> Self {
        NodeAnnouncement {
            addr: addr.into(),
            meta: meta.into(),
        }
    }
}

/// An opaque application payload received over a member's exchange stream.
///
/// The core attributes each record to the member whose stream delivered it
/// and never inspects the payload itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerMetadataRecord {
    /// Opaque record bytes
    pub payload: Bytes,
}

impl PeerMetadataRecord {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        PeerMetadataRecord {
            payload: payload.into(),
        }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
