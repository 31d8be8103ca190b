//! Accept side of the exchange protocol
//!
//! The membership core itself only dials. The listener exists for
//! embedding daemons that serve the exchange call to other nodes, and for
//! test harnesses standing in as remote peers.

use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;

use pex_core::{NodeId, PeerMetadataRecord, PexError, PexResult};
use pex_wire::{Frame, FrameKind, HelloPayload};

use crate::{read_frame, write_frame, TransportCredentials};

/// Listener accepting inbound exchange sessions
pub struct ExchangeListener {
    listener: TcpListener,
    credentials: TransportCredentials,
}

impl ExchangeListener {
    /// Bind on `addr` with the given credentials
    pub async fn bind(addr: SocketAddr, credentials: TransportCredentials) -> PexResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|err| PexError::Transport(format!("Failed to bind {addr}: {err}")))?;

        Ok(ExchangeListener {
            listener,
            credentials,
        })
    }

    /// Local listening address
    pub fn local_addr(&self) -> PexResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|err| PexError::Transport(err.to_string()))
    }

    /// Accept one inbound session, performing the acceptor half of the
    /// negotiation. A failed negotiation closes the connection and the
    /// accept loop can continue with the next one.
    pub async fn accept(&self) -> PexResult<InboundExchange> {
        let (stream, remote) = self
            .listener
            .accept()
            .await
            .map_err(|err| PexError::Transport(err.to_string()))?;

        let (mut reader, mut writer) = stream.into_split();

        let peer = match negotiate_inbound(&self.credentials, &mut reader, &mut writer).await {
            Ok(peer) => peer,
            Err(err) => {
                let _ = writer.shutdown().await;
                return Err(err);
            }
        };

        tracing::debug!(%remote, %peer, "inbound exchange stream negotiated");

        Ok(InboundExchange {
            remote,
            peer,
            reader,
            writer,
        })
    }
}

/// Acceptor half of the negotiation: verify the Hello, answer HelloAck.
async fn negotiate_inbound(
    credentials: &TransportCredentials,
    reader: &mut OwnedReadHalf,
    writer: &mut OwnedWriteHalf,
) -> PexResult<NodeId> {
    let hello = read_frame(reader).await?;
    if hello.kind != FrameKind::Hello {
        return Err(PexError::HandshakeRejected(format!(
            "Expected Hello, got {:?}",
            hello.kind
        )));
    }

    let payload = HelloPayload::parse(&hello.payload)?;
    let peer = TransportCredentials::verify_hello(&payload)?;

    let answer = Frame::with_payload(FrameKind::HelloAck, credentials.hello_payload().serialize());
    write_frame(writer, &answer).await?;

    Ok(peer)
}

/// An accepted inbound exchange session
pub struct InboundExchange {
    remote: SocketAddr,
    peer: NodeId,
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
}

impl InboundExchange {
    /// Remote address of the dialing node
    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// Peer identity learned during negotiation
    pub fn peer(&self) -> NodeId {
        self.peer
    }

    /// Send one metadata record to the dialing node
    pub async fn send_record(&mut self, record: &PeerMetadataRecord) -> PexResult<()> {
        let frame = Frame::metadata(record.payload.clone());
        write_frame(&mut self.writer, &frame).await
    }

    /// Receive whatever the dialing node chooses to send
    pub async fn recv(&mut self) -> PexResult<PeerMetadataRecord> {
        let frame = read_frame(&mut self.reader).await?;
        match frame.kind {
            FrameKind::Metadata => Ok(PeerMetadataRecord::new(frame.payload)),
            FrameKind::Bye => Err(PexError::StreamClosed),
            other => Err(PexError::StreamReceive(format!(
                "Unexpected {other:?} frame on established stream"
            ))),
        }
    }

    /// Announce send-direction close and shut the connection down
    pub async fn close(mut self) -> PexResult<()> {
        let bye = write_frame(&mut self.writer, &Frame::new(FrameKind::Bye)).await;
        let shutdown = self
            .writer
            .shutdown()
            .await
            .map_err(|err| PexError::Transport(err.to_string()));

        match (bye, shutdown) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err),
            (Err(a), Err(b)) => Err(PexError::Transport(format!("{a}; {b}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pex_core::MemberMeta;

    use super::*;
    use crate::{DialConfig, Dialer, TcpDialer};

    fn loopback_meta(port: u16) -> MemberMeta {
        MemberMeta {
            ip: "127.0.0.1".to_string(),
            rpc_port: port,
        }
    }

    #[tokio::test]
    async fn test_dial_and_accept_negotiate() {
        let listener = ExchangeListener::bind(
            "127.0.0.1:0".parse().unwrap(),
            TransportCredentials::generate(),
        )
        .await
        .unwrap();
        let port = listener.local_addr().unwrap().port();

        let dialer_credentials = TransportCredentials::generate();
        let dialer_id = dialer_credentials.node_id();
        let dialer = TcpDialer::new(dialer_credentials, DialConfig::new(Duration::from_secs(2)));

        let accept = tokio::spawn(async move { listener.accept().await });
        let session = dialer.dial(&loopback_meta(port)).await.unwrap();

        let inbound = accept.await.unwrap().unwrap();
        assert_eq!(inbound.peer(), dialer_id);
        assert_ne!(session.peer(), NodeId::ZERO);
    }

    #[tokio::test]
    async fn test_records_flow_to_dialer() {
        let listener = ExchangeListener::bind(
            "127.0.0.1:0".parse().unwrap(),
            TransportCredentials::generate(),
        )
        .await
        .unwrap();
        let port = listener.local_addr().unwrap().port();

        let dialer = TcpDialer::new(
            TransportCredentials::generate(),
            DialConfig::new(Duration::from_secs(2)),
        );

        let serve = tokio::spawn(async move {
            let mut inbound = listener.accept().await.unwrap();
            inbound
                .send_record(&PeerMetadataRecord::new(&b"r1"[..]))
                .await
                .unwrap();
            inbound.close().await.unwrap();
        });

        let session = dialer.dial(&loopback_meta(port)).await.unwrap();
        let (_handle, mut receiver) = session.into_parts();

        let record = receiver.recv().await.unwrap();
        assert_eq!(record, PeerMetadataRecord::new(&b"r1"[..]));
        assert!(matches!(
            receiver.recv().await,
            Err(PexError::StreamClosed)
        ));

        serve.await.unwrap();
    }

    #[tokio::test]
    async fn test_dial_refused() {
        // Bind then drop to get a port nothing listens on.
        let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let dialer = TcpDialer::new(
            TransportCredentials::generate(),
            DialConfig::new(Duration::from_secs(2)),
        );

        assert!(matches!(
            dialer.dial(&loopback_meta(port)).await,
            Err(PexError::DialFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_negotiation_failure_closes_connection() {
        // A server that answers Hello with a Metadata frame instead of HelloAck.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let serve = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (mut reader, mut writer) = stream.into_split();
            let _ = read_frame(&mut reader).await.unwrap();
            write_frame(&mut writer, &Frame::metadata(&b"bogus"[..]))
                .await
                .unwrap();
            // The dialer must have closed its side; the next read sees EOF.
            assert!(matches!(
                read_frame(&mut reader).await,
                Err(PexError::StreamClosed)
            ));
        });

        let dialer = TcpDialer::new(
            TransportCredentials::generate(),
            DialConfig::new(Duration::from_secs(2)),
        );

        assert!(matches!(
            dialer.dial(&loopback_meta(port)).await,
            Err(PexError::StreamNegotiation { .. })
        ));

        serve.await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_dialer_attestation_rejected() {
        let listener = ExchangeListener::bind(
            "127.0.0.1:0".parse().unwrap(),
            TransportCredentials::generate(),
        )
        .await
        .unwrap();
        let port = listener.local_addr().unwrap().port();

        let connect = tokio::spawn(async move {
            let stream = tokio::net::TcpStream::connect(("127.0.0.1", port))
                .await
                .unwrap();
            let (_reader, mut writer) = stream.into_split();

            let mut payload = TransportCredentials::generate().hello_payload();
            payload.signature[0] ^= 0xFF;
            let hello = Frame::with_payload(FrameKind::Hello, payload.serialize());
            write_frame(&mut writer, &hello).await.unwrap();
        });

        assert!(matches!(
            listener.accept().await,
            Err(PexError::HandshakeRejected(_))
        ));

        connect.await.unwrap();
    }
}
