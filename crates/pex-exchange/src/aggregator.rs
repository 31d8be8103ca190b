//! Peer metadata aggregator - latest record per member
//!
//! The aggregator is the core's only externally visible output besides
//! logs: downstream peer-selection logic reads it through `latest` and
//! `snapshot`. Record contents are never interpreted here.

use std::collections::HashMap;

use parking_lot::RwLock;

use pex_core::PeerMetadataRecord;

/// Concurrent store of the latest metadata record per member IP
#[derive(Debug, Default)]
pub struct MetadataAggregator {
    records: RwLock<HashMap<String, PeerMetadataRecord>>,
}

impl MetadataAggregator {
    pub fn new() -> Self {
        MetadataAggregator::default()
    }

    /// Store `record` as the latest metadata for `ip` (last write wins)
    pub fn sync(&self, ip: &str, record: PeerMetadataRecord) {
        tracing::trace!(member = %ip, bytes = record.len(), "peer metadata synced");
        self.records.write().insert(ip.to_string(), record);
    }

    /// Latest record for `ip`, if any
    pub fn latest(&self, ip: &str) -> Option<PeerMetadataRecord> {
        self.records.read().get(ip).cloned()
    }

    /// Snapshot of the latest record for every member
    pub fn snapshot(&self) -> HashMap<String, PeerMetadataRecord> {
        self.records.read().clone()
    }

    /// Number of members with at least one record
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
