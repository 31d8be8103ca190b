//! Stream sync worker - per-member receive loop

use std::sync::Arc;

use pex_transport::MetadataReceiver;

use crate::MetadataAggregator;

/// Drain a member's exchange stream into the aggregator.
///
/// Runs until the first receive error, including graceful remote closure.
/// No reconnect is attempted here; recovery, if any, comes from a later
/// join notification for the same IP re-entering the event handler.
pub(crate) async fn run_sync_worker(
    ip: String,
    mut receiver: Box<dyn MetadataReceiver>,
    aggregator: Arc<MetadataAggregator>,
) {
    loop {
        match receiver.recv().await {
            Ok(record) => aggregator.sync(&ip, record),
            Err(err) => {
                tracing::debug!(member = %ip, %err, "exchange stream ended");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pex_core::{NodeId, PeerMetadataRecord, PexError};
    use pex_transport::memory_session;

    use super::*;

    #[tokio::test]
    async fn test_worker_forwards_until_close() {
        let aggregator = Arc::new(MetadataAggregator::new());
        let (session, remote) = memory_session("10.0.0.2:9001", NodeId::new(1));
        let (_handle, receiver) = session.into_parts();

        remote.push(PeerMetadataRecord::new(&b"r1"[..]));
        remote.push(PeerMetadataRecord::new(&b"r2"[..]));
        remote.close();

        run_sync_worker("10.0.0.2".to_string(), receiver, aggregator.clone()).await;

        assert_eq!(
            aggregator.latest("10.0.0.2"),
            Some(PeerMetadataRecord::new(&b"r2"[..]))
        );
    }

    #[tokio::test]
    async fn test_worker_stops_on_receive_error() {
        let aggregator = Arc::new(MetadataAggregator::new());
        let (session, remote) = memory_session("10.0.0.2:9001", NodeId::new(1));
        let (_handle, receiver) = session.into_parts();

        remote.push(PeerMetadataRecord::new(&b"r1"[..]));
        remote.fail(PexError::StreamReceive("connection reset".into()));
        // A record after the error must never be consumed.
        remote.push(PeerMetadataRecord::new(&b"r2"[..]));

        run_sync_worker("10.0.0.2".to_string(), receiver, aggregator.clone()).await;

        assert_eq!(
            aggregator.latest("10.0.0.2"),
            Some(PeerMetadataRecord::new(&b"r1"[..]))
        );
    }
}
