//! Connection establishment
//!
//! The dialer normalizes the member address, opens the transport under a
//! bounded deadline, then negotiates the exchange stream. A failed
//! negotiation closes the transport before returning; no connection leaks
//! out of a partial failure.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use pex_core::{format_ip, MemberMeta, NodeId, PexError, PexResult};
use pex_wire::{Frame, FrameKind, HelloPayload};

use crate::{
    read_frame, write_frame, ExchangeSession, TcpMetadataReceiver, TcpSessionControl,
    TransportCredentials,
};

/// Dialer configuration supplied by the embedding process
#[derive(Clone, Debug)]
pub struct DialConfig {
    /// Bound on the transport connect
    pub dial_timeout: Duration,
}

impl DialConfig {
    pub fn new(dial_timeout: Duration) -> Self {
        DialConfig { dial_timeout }
    }
}

/// Connection establisher seam
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Open a secured exchange session to the member described by `meta`.
    async fn dial(&self, meta: &MemberMeta) -> PexResult<ExchangeSession>;
}

/// Production TCP dialer
pub struct TcpDialer {
    credentials: TransportCredentials,
    config: DialConfig,
}

impl TcpDialer {
    pub fn new(credentials: TransportCredentials, config: DialConfig) -> Self {
        TcpDialer {
            credentials,
            config,
        }
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, meta: &MemberMeta) -> PexResult<ExchangeSession> {
        let ip = format_ip(&meta.ip)?;
        let target = SocketAddr::new(ip, meta.rpc_port);
        let addr = target.to_string();

        let stream = match timeout(self.config.dial_timeout, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                return Err(PexError::DialFailed {
                    addr,
                    reason: err.to_string(),
                })
            }
            Err(_) => {
                return Err(PexError::DialFailed {
                    addr,
                    reason: format!("connect timed out after {:?}", self.config.dial_timeout),
                })
            }
        };

        let (mut reader, mut writer) = stream.into_split();

        let peer = match negotiate_outbound(&self.credentials, &mut reader, &mut writer).await {
            Ok(peer) => peer,
            Err(err) => {
                let _ = writer.shutdown().await;
                return Err(PexError::StreamNegotiation {
                    addr,
                    reason: err.to_string(),
                });
            }
        };

        tracing::debug!(%addr, %peer, "exchange stream negotiated");

        Ok(ExchangeSession::new(
            addr,
            peer,
            Box::new(TcpMetadataReceiver::new(reader)),
            Box::new(TcpSessionControl::new(writer)),
        ))
    }
}

/// Dialer half of the negotiation: send Hello, verify the HelloAck.
async fn negotiate_outbound(
    credentials: &TransportCredentials,
    reader: &mut OwnedReadHalf,
    writer: &mut OwnedWriteHalf,
) -> PexResult<NodeId> {
    let hello = Frame::with_payload(FrameKind::Hello, credentials.hello_payload().serialize());
    write_frame(writer, &hello).await?;

    let answer = read_frame(reader).await?;
    if answer.kind != FrameKind::HelloAck {
        return Err(PexError::HandshakeRejected(format!(
            "Expected HelloAck, got {:?}",
            answer.kind
        )));
    }

    let payload = HelloPayload::parse(&answer.payload)?;
    TransportCredentials::verify_hello(&payload)
}
