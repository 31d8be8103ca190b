//! In-memory exchange transport
//!
//! Channel-backed sessions with the same split and close semantics as the
//! TCP transport, plus a scripted dialer. Used to drive the membership
//! core deterministically in tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use pex_core::{MemberMeta, NodeId, PeerMetadataRecord, PexError, PexResult};

use crate::{Dialer, ExchangeSession, MetadataReceiver, SessionControl};

/// Create an in-memory session and the remote handle driving it.
pub fn memory_session(remote: impl Into<String>, peer: NodeId) -> (ExchangeSession, MemoryRemote) {
    let remote = remote.into();
    let (record_tx, record_rx) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));

    let session = ExchangeSession::new(
        remote.clone(),
        peer,
        Box::new(MemoryReceiver { records: record_rx }),
        Box::new(MemoryControl {
            closed: closed.clone(),
        }),
    );

    let handle = MemoryRemote {
        remote,
        peer,
        record_tx,
        closed,
    };

    (session, handle)
}

struct MemoryReceiver {
    records: mpsc::UnboundedReceiver<PexResult<PeerMetadataRecord>>,
}

#[async_trait]
impl MetadataReceiver for MemoryReceiver {
    async fn recv(&mut self) -> PexResult<PeerMetadataRecord> {
        match self.records.recv().await {
            Some(result) => result,
            None => Err(PexError::StreamClosed),
        }
    }
}

struct MemoryControl {
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl SessionControl for MemoryControl {
    async fn close_send(&mut self) -> PexResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close_transport(&mut self) -> PexResult<()> {
        Ok(())
    }
}

/// Remote end of an in-memory session
pub struct MemoryRemote {
    remote: String,
    peer: NodeId,
    record_tx: mpsc::UnboundedSender<PexResult<PeerMetadataRecord>>,
    closed: Arc<AtomicBool>,
}

impl MemoryRemote {
    /// Address the session was "dialed" to
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Peer identity assigned to the session
    pub fn peer(&self) -> NodeId {
        self.peer
    }

    /// Deliver one metadata record; `false` if the receiver is gone
    pub fn push(&self, record: PeerMetadataRecord) -> bool {
        self.record_tx.send(Ok(record)).is_ok()
    }

    /// Deliver a receive error to the session
    pub fn fail(&self, err: PexError) -> bool {
        self.record_tx.send(Err(err)).is_ok()
    }

    /// Close the stream gracefully (the session observes StreamClosed)
    pub fn close(self) {
        drop(self.record_tx);
    }

    /// Whether the local side has closed its send direction
    pub fn is_session_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Scripted dialer for driving the membership handler in tests.
///
/// Every successful dial creates a fresh in-memory session with a unique
/// peer ID and emits its [`MemoryRemote`] on the channel returned by
/// [`MemoryDialer::new`].
pub struct MemoryDialer {
    refuse: Mutex<HashSet<String>>,
    dialed: Mutex<Vec<String>>,
    next_peer: AtomicU64,
    connected_tx: mpsc::UnboundedSender<MemoryRemote>,
}

impl MemoryDialer {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MemoryRemote>) {
        let (connected_tx, connected_rx) = mpsc::unbounded_channel();
        let dialer = Arc::new(MemoryDialer {
            refuse: Mutex::new(HashSet::new()),
            dialed: Mutex::new(Vec::new()),
            next_peer: AtomicU64::new(1),
            connected_tx,
        });

        (dialer, connected_rx)
    }

    /// Make subsequent dials to `ip` fail with [`PexError::DialFailed`]
    pub fn refuse(&self, ip: &str) {
        self.refuse.lock().insert(ip.to_string());
    }

    /// IPs dialed so far, in order
    pub fn dialed(&self) -> Vec<String> {
        self.dialed.lock().clone()
    }
}

#[async_trait]
impl Dialer for MemoryDialer {
    async fn dial(&self, meta: &MemberMeta) -> PexResult<ExchangeSession> {
        let addr = format!("{}:{}", meta.ip, meta.rpc_port);
        self.dialed.lock().push(meta.ip.clone());

        if self.refuse.lock().contains(&meta.ip) {
            return Err(PexError::DialFailed {
                addr,
                reason: "connection refused".into(),
            });
        }

        let peer = NodeId::new(self.next_peer.fetch_add(1, Ordering::SeqCst));
        let (session, remote) = memory_session(addr, peer);
        let _ = self.connected_tx.send(remote);

        Ok(session)
    }
}
