//! Membership event handler
//!
//! One lightweight task is spawned per join notification; the task runs
//! extraction, the registry claim, connection establishment, and then
//! becomes the member's long-lived stream sync worker. The registry's
//! atomic claim is the only cross-task coordination point.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use pex_core::{extract_member_meta, NodeAnnouncement, PeerMetadataRecord, PexError};
use pex_transport::Dialer;

use crate::sync::run_sync_worker;
use crate::{Member, MemberRegistry, MembershipObserver, MetadataAggregator};

/// Orchestrates member discovery: reacts to membership events, claims one
/// exchange session per member IP, and fans received metadata into the
/// aggregator.
#[derive(Clone)]
pub struct ExchangeMemberManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    registry: Arc<MemberRegistry>,
    aggregator: Arc<MetadataAggregator>,
    dialer: Arc<dyn Dialer>,
    local_updates: Mutex<Option<mpsc::Receiver<PeerMetadataRecord>>>,
}

impl ExchangeMemberManager {
    /// Create a manager with fresh stores.
    ///
    /// `local_updates` is the feed of locally originated metadata changes.
    /// The manager only retains it for an external broadcaster collaborator
    /// (see [`ExchangeMemberManager::take_local_updates`]); nothing in this
    /// core drains it.
    pub fn new(dialer: Arc<dyn Dialer>, local_updates: mpsc::Receiver<PeerMetadataRecord>) -> Self {
        Self::with_stores(
            dialer,
            local_updates,
            Arc::new(MemberRegistry::new()),
            Arc::new(MetadataAggregator::new()),
        )
    }

    /// Create a manager around existing stores
    pub fn with_stores(
        dialer: Arc<dyn Dialer>,
        local_updates: mpsc::Receiver<PeerMetadataRecord>,
        registry: Arc<MemberRegistry>,
        aggregator: Arc<MetadataAggregator>,
    ) -> Self {
        ExchangeMemberManager {
            inner: Arc::new(ManagerInner {
                registry,
                aggregator,
                dialer,
                local_updates: Mutex::new(Some(local_updates)),
            }),
        }
    }

    /// The member registry
    pub fn registry(&self) -> &Arc<MemberRegistry> {
        &self.inner.registry
    }

    /// The metadata aggregator read by downstream peer selection
    pub fn aggregator(&self) -> &Arc<MetadataAggregator> {
        &self.inner.aggregator
    }

    /// Hand the local update feed to the external broadcaster.
    ///
    /// Returns `None` once taken.
    pub fn take_local_updates(&self) -> Option<mpsc::Receiver<PeerMetadataRecord>> {
        self.inner.local_updates.lock().take()
    }

    /// Process one join notification to completion: extract, claim, dial,
    /// then drain the member's stream until it ends.
    ///
    /// Every failure is local to this event: log, abandon, no retry.
    pub async fn sync_node(&self, node: NodeAnnouncement) {
        let meta = match extract_member_meta(&node) {
            Ok(meta) => meta,
            Err(err) => {
                tracing::error!(addr = %node.addr, %err, "failed to extract node metadata");
                return;
            }
        };

        if self.inner.registry.is_registered(&meta.ip) {
            tracing::debug!(member = %meta.ip, "node is already registered");
            return;
        }

        let session = match self.inner.dialer.dial(&meta).await {
            Ok(session) => session,
            Err(err) => {
                tracing::error!(member = %meta.ip, %err, "failed to dial member");
                return;
            }
        };

        let (handle, receiver) = session.into_parts();
        let member = Member::new(meta.ip.clone(), handle);

        if let Err(rejected) = self.inner.registry.register(member) {
            // A concurrent duplicate event won the claim race; benign.
            let race = PexError::AlreadyRegistered(rejected.ip().to_string());
            tracing::debug!(%race, "abandoning duplicate session");
            if let Err(err) = rejected.close().await {
                tracing::warn!(member = %meta.ip, %err, "failed to close duplicate session");
            }
            return;
        }

        run_sync_worker(meta.ip, receiver, self.inner.aggregator.clone()).await;
    }
}

impl MembershipObserver for ExchangeMemberManager {
    fn on_join(&self, node: NodeAnnouncement) {
        tracing::info!(addr = %node.addr, "peer joined");
        let manager = self.clone();
        tokio::spawn(async move { manager.sync_node(node).await });
    }

    fn on_leave(&self, node: NodeAnnouncement) {
        tracing::info!(addr = %node.addr, "peer left");
    }

    fn on_update(&self, node: NodeAnnouncement) {
        tracing::info!(addr = %node.addr, "peer updated");
    }
}

impl std::fmt::Debug for ExchangeMemberManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeMemberManager")
            .field("members", &self.inner.registry.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use pex_core::{NodeId, PexError};
    use pex_transport::{memory_session, ExchangeSession, MemoryDialer, MemoryRemote};
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;

    fn manager_with_memory_dialer() -> (
        ExchangeMemberManager,
        Arc<MemoryDialer>,
        UnboundedReceiver<MemoryRemote>,
    ) {
        let (dialer, connected) = MemoryDialer::new();
        let (_tx, local_updates) = mpsc::channel(8);
        let manager = ExchangeMemberManager::new(dialer.clone(), local_updates);
        (manager, dialer, connected)
    }

    fn join(ip: &str) -> NodeAnnouncement {
        NodeAnnouncement::new(format!("{ip}:7946"), br#"{"rpc_port": 9001}"#.to_vec())
    }

    #[tokio::test]
    async fn test_malformed_payload_causes_no_side_effects() {
        let (manager, dialer, _connected) = manager_with_memory_dialer();

        let node = NodeAnnouncement::new("10.0.0.2:7946", b"not json".to_vec());
        manager.sync_node(node).await;

        assert!(dialer.dialed().is_empty());
        assert!(manager.registry().is_empty());
        assert!(manager.aggregator().is_empty());
    }

    #[tokio::test]
    async fn test_join_registers_and_aggregates() {
        let (manager, _dialer, mut connected) = manager_with_memory_dialer();

        let worker = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.sync_node(join("10.0.0.2")).await })
        };

        let remote = connected.recv().await.unwrap();
        remote.push(PeerMetadataRecord::new(&b"r1"[..]));
        remote.push(PeerMetadataRecord::new(&b"r2"[..]));
        remote.close();
        worker.await.unwrap();

        assert!(manager.registry().is_registered("10.0.0.2"));
        assert_eq!(
            manager.aggregator().latest("10.0.0.2"),
            Some(PeerMetadataRecord::new(&b"r2"[..]))
        );
    }

    #[tokio::test]
    async fn test_duplicate_join_is_idempotent() {
        let (manager, dialer, mut connected) = manager_with_memory_dialer();

        let worker = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.sync_node(join("10.0.0.2")).await })
        };
        let remote = connected.recv().await.unwrap();
        let first_peer = remote.peer();
        while !manager.registry().is_registered("10.0.0.2") {
            tokio::task::yield_now().await;
        }

        // Second join for the same IP after registration: no new dial,
        // stored session unchanged.
        manager.sync_node(join("10.0.0.2")).await;

        assert_eq!(dialer.dialed().len(), 1);
        assert_eq!(manager.registry().peer("10.0.0.2"), Some(first_peer));

        remote.close();
        worker.await.unwrap();
    }

    /// Dialer that lets a concurrent duplicate event win the registry
    /// claim while this dial is still in flight.
    struct ClaimDuringDial {
        inner: Arc<MemoryDialer>,
        registry: Arc<MemberRegistry>,
        winner: Mutex<Option<MemoryRemote>>,
    }

    #[async_trait::async_trait]
    impl Dialer for ClaimDuringDial {
        async fn dial(&self, meta: &pex_core::MemberMeta) -> pex_core::PexResult<ExchangeSession> {
            let session = self.inner.dial(meta).await?;

            let (winner_session, winner_remote) =
                memory_session(format!("{}:{}", meta.ip, meta.rpc_port), NodeId::new(0xBEEF));
            let (handle, _receiver) = winner_session.into_parts();
            self.registry
                .register(Member::new(meta.ip.clone(), handle))
                .unwrap();
            *self.winner.lock() = Some(winner_remote);

            Ok(session)
        }
    }

    #[tokio::test]
    async fn test_lost_claim_race_closes_just_opened_session() {
        let (memory_dialer, mut connected) = MemoryDialer::new();
        let registry = Arc::new(MemberRegistry::new());
        let aggregator = Arc::new(MetadataAggregator::new());
        let dialer = Arc::new(ClaimDuringDial {
            inner: memory_dialer,
            registry: registry.clone(),
            winner: Mutex::new(None),
        });
        let (_tx, local_updates) = mpsc::channel(8);
        let manager = ExchangeMemberManager::with_stores(
            dialer.clone(),
            local_updates,
            registry.clone(),
            aggregator,
        );

        manager.sync_node(join("10.0.0.2")).await;

        // The loser's just-opened session was closed without ever being
        // used; the winner's session stays registered untouched.
        let loser = connected.try_recv().unwrap();
        assert!(loser.is_session_closed());

        let winner = dialer.winner.lock().take().unwrap();
        assert!(!winner.is_session_closed());
        assert_eq!(registry.peer("10.0.0.2"), Some(NodeId::new(0xBEEF)));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_dial_failure_leaves_no_registration() {
        let (manager, dialer, _connected) = manager_with_memory_dialer();
        dialer.refuse("10.0.0.2");

        manager.sync_node(join("10.0.0.2")).await;

        assert_eq!(dialer.dialed().len(), 1);
        assert!(!manager.registry().is_registered("10.0.0.2"));
    }

    #[tokio::test]
    async fn test_disconnected_member_stays_registered() {
        let (manager, dialer, mut connected) = manager_with_memory_dialer();

        let worker = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.sync_node(join("10.0.0.2")).await })
        };
        let remote = connected.recv().await.unwrap();
        remote.fail(PexError::StreamReceive("connection reset".into()));
        worker.await.unwrap();

        // The entry is not removed when the stream ends, so a later join
        // for the same IP is a no-op and never re-dials.
        assert!(manager.registry().is_registered("10.0.0.2"));
        manager.sync_node(join("10.0.0.2")).await;
        assert_eq!(dialer.dialed().len(), 1);
    }

    #[tokio::test]
    async fn test_local_update_feed_is_retained_not_drained() {
        let (dialer, _connected) = MemoryDialer::new();
        let (tx, local_updates) = mpsc::channel(8);
        let manager = ExchangeMemberManager::new(dialer, local_updates);

        tx.send(PeerMetadataRecord::new(&b"local"[..]))
            .await
            .unwrap();

        let mut feed = manager.take_local_updates().unwrap();
        assert_eq!(
            feed.recv().await,
            Some(PeerMetadataRecord::new(&b"local"[..]))
        );
        assert!(manager.take_local_updates().is_none());
    }
}
