//! Framed exchange streams over byte transports
//!
//! Frames are written length-prefixed (u32 LE) onto any async byte stream.
//! The receive and control halves of a session are object-safe traits so
//! the in-memory transport can stand in for TCP under test.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use pex_core::{PeerMetadataRecord, PexError, PexResult};
use pex_wire::{Frame, FrameKind, FRAME_HEADER_SIZE, MAX_FRAME_SIZE};

/// Read one length-prefixed frame from `reader`.
///
/// A clean EOF before the length prefix maps to [`PexError::StreamClosed`];
/// any other failure maps to [`PexError::StreamReceive`].
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> PexResult<Frame> {
    let mut len_buf = [0u8; 4];
    if let Err(err) = reader.read_exact(&mut len_buf).await {
        return Err(if err.kind() == io::ErrorKind::UnexpectedEof {
            PexError::StreamClosed
        } else {
            PexError::StreamReceive(err.to_string())
        });
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if !(FRAME_HEADER_SIZE..=MAX_FRAME_SIZE).contains(&len) {
        return Err(PexError::InvalidWireFormat(format!(
            "Bad frame length: {len}"
        )));
    }

    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(|err| PexError::StreamReceive(err.to_string()))?;

    Frame::parse(&buf)
}

/// Write one length-prefixed frame to `writer`.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> PexResult<()> {
    let bytes = frame.serialize()?;

    writer
        .write_all(&(bytes.len() as u32).to_le_bytes())
        .await
        .map_err(|err| PexError::Transport(err.to_string()))?;
    writer
        .write_all(&bytes)
        .await
        .map_err(|err| PexError::Transport(err.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|err| PexError::Transport(err.to_string()))?;

    Ok(())
}

/// Receive half of an exchange session
#[async_trait]
pub trait MetadataReceiver: Send {
    /// Block until the next metadata record arrives.
    ///
    /// Returns [`PexError::StreamClosed`] when the remote closes the stream
    /// (Bye frame or transport EOF).
    async fn recv(&mut self) -> PexResult<PeerMetadataRecord>;
}

/// Control half of an exchange session, owned by the registry entry
#[async_trait]
pub trait SessionControl: Send + Sync {
    /// Close the send direction of the exchange stream (Bye frame).
    async fn close_send(&mut self) -> PexResult<()>;

    /// Close the underlying transport.
    async fn close_transport(&mut self) -> PexResult<()>;
}

/// TCP receive half
pub struct TcpMetadataReceiver {
    reader: OwnedReadHalf,
}

impl TcpMetadataReceiver {
    pub fn new(reader: OwnedReadHalf) -> Self {
        TcpMetadataReceiver { reader }
    }
}

#[async_trait]
impl MetadataReceiver for TcpMetadataReceiver {
    async fn recv(&mut self) -> PexResult<PeerMetadataRecord> {
        let frame = read_frame(&mut self.reader).await?;
        match frame.kind {
            FrameKind::Metadata => Ok(PeerMetadataRecord::new(frame.payload)),
            FrameKind::Bye => Err(PexError::StreamClosed),
            other => Err(PexError::StreamReceive(format!(
                "Unexpected {other:?} frame on established stream"
            ))),
        }
    }
}

/// TCP control half
pub struct TcpSessionControl {
    writer: OwnedWriteHalf,
}

impl TcpSessionControl {
    pub fn new(writer: OwnedWriteHalf) -> Self {
        TcpSessionControl { writer }
    }
}

#[async_trait]
impl SessionControl for TcpSessionControl {
    async fn close_send(&mut self) -> PexResult<()> {
        write_frame(&mut self.writer, &Frame::new(FrameKind::Bye)).await
    }

    async fn close_transport(&mut self) -> PexResult<()> {
        self.writer
            .shutdown()
            .await
            .map_err(|err| PexError::Transport(err.to_string()))
    }
}
