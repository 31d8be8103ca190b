//! Scripted remote peers for exchange protocol tests

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

use pex_core::{PeerMetadataRecord, PexResult};
use pex_transport::{ExchangeListener, TransportCredentials};

/// A scripted remote peer serving the exchange protocol over TCP.
///
/// Every accepted session gets the same treatment: complete the
/// negotiation, stream the scripted records, close.
pub struct MockPeer {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl MockPeer {
    /// Bind on an ephemeral localhost port and serve `records`.
    pub async fn serve(records: Vec<PeerMetadataRecord>) -> PexResult<Self> {
        let listener = ExchangeListener::bind(
            SocketAddr::from(([127, 0, 0, 1], 0)),
            TransportCredentials::generate(),
        )
        .await?;
        let addr = listener.local_addr()?;
        let accepted = Arc::new(AtomicUsize::new(0));

        let task = {
            let accepted = accepted.clone();
            tokio::spawn(async move {
                loop {
                    match listener.accept().await {
                        Ok(mut inbound) => {
                            accepted.fetch_add(1, Ordering::SeqCst);
                            tracing::debug!(remote = %inbound.remote(), "mock peer accepted session");
                            for record in &records {
                                if inbound.send_record(record).await.is_err() {
                                    return;
                                }
                            }
                            let _ = inbound.close().await;
                        }
                        Err(err) => {
                            tracing::debug!(%err, "mock peer rejected session");
                        }
                    }
                }
            })
        };

        Ok(MockPeer {
            addr,
            accepted,
            task,
        })
    }

    /// Address the peer listens on
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Port of the peer's exchange endpoint
    pub fn rpc_port(&self) -> u16 {
        self.addr.port()
    }

    /// Number of sessions the peer has accepted
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

impl Drop for MockPeer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
