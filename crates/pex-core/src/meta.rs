//! Member metadata extraction
//!
//! Nodes announce a small JSON document through the gossip engine:
//! an optional `ip` and the RPC port their exchange endpoint listens on.
//! Unknown fields are ignored so the announced document can grow without
//! breaking older peers.

use serde::{Deserialize, Serialize};

use crate::{host_component, NodeAnnouncement, PexError, PexResult};

/// Decoded member identity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberMeta {
    /// Member IP; defaults to the gossip-reported address when omitted
    #[serde(default)]
    pub ip: String,
    /// Port of the member's exchange RPC endpoint
    pub rpc_port: u16,
}

/// Decode a node's announced metadata into a [`MemberMeta`].
///
/// If the announced document omits the IP, the host component of the
/// gossip-reported address is substituted, so a successful extraction
/// always yields a non-empty IP. Pure; performs no I/O.
pub fn extract_member_meta(announcement: &NodeAnnouncement) -> PexResult<MemberMeta> {
    let mut meta: MemberMeta = serde_json::from_slice(&announcement.meta)
        .map_err(|err| PexError::InvalidMetadata(err.to_string()))?;

    if meta.ip.is_empty() {
        meta.ip = host_component(&announcement.addr).to_string();
    }

    Ok(meta)
}
