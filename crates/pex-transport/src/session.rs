//! Established exchange sessions
//!
//! A dialed session splits into two owned halves: the control half
//! (send-direction close plus transport close) that the member registry
//! keeps, and the receive half the stream sync worker drains. The split
//! mirrors the two handles returned by the dialer: the transport client
//! and the negotiated stream.

use pex_core::{NodeId, PexError, PexResult};

use crate::{MetadataReceiver, SessionControl};

/// An established, negotiated exchange session
pub struct ExchangeSession {
    remote: String,
    peer: NodeId,
    receiver: Box<dyn MetadataReceiver>,
    control: Box<dyn SessionControl>,
}

impl ExchangeSession {
    pub fn new(
        remote: impl Into<String>,
        peer: NodeId,
        receiver: Box<dyn MetadataReceiver>,
        control: Box<dyn SessionControl>,
    ) -> Self {
        ExchangeSession {
            remote: remote.into(),
            peer,
            receiver,
            control,
        }
    }

    /// Remote address the session was dialed to
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Peer identity learned during negotiation
    pub fn peer(&self) -> NodeId {
        self.peer
    }

    /// Split into the registry-owned handle and the worker-owned receiver
    pub fn into_parts(self) -> (SessionHandle, Box<dyn MetadataReceiver>) {
        (
            SessionHandle {
                remote: self.remote,
                peer: self.peer,
                control: self.control,
            },
            self.receiver,
        )
    }

    /// Close the whole session without ever using it.
    ///
    /// Used when a concurrent duplicate claim wins the registry race.
    pub async fn close(self) -> PexResult<()> {
        let (handle, receiver) = self.into_parts();
        drop(receiver);
        handle.close().await
    }
}

impl std::fmt::Debug for ExchangeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeSession")
            .field("remote", &self.remote)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

/// Owned close handle for an established session
pub struct SessionHandle {
    remote: String,
    peer: NodeId,
    control: Box<dyn SessionControl>,
}

impl SessionHandle {
    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn peer(&self) -> NodeId {
        self.peer
    }

    /// Close the stream's send direction, then the underlying transport.
    ///
    /// Both close errors are aggregated: if both fail the combined message
    /// is returned, if one fails that error is returned as-is.
    pub async fn close(mut self) -> PexResult<()> {
        let send_result = self.control.close_send().await;
        let transport_result = self.control.close_transport().await;

        match (send_result, transport_result) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err),
            (Err(send_err), Err(transport_err)) => Err(PexError::Transport(format!(
                "{send_err}; {transport_err}"
            ))),
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("remote", &self.remote)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}
