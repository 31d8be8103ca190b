//! Member registry - atomic claim of exchange sessions per member IP

use std::collections::HashMap;

use parking_lot::RwLock;

use pex_core::{NodeId, PexResult};
use pex_transport::SessionHandle;

/// A registered member: the owned control handle of its exchange session
pub struct Member {
    ip: String,
    handle: SessionHandle,
}

impl Member {
    pub fn new(ip: impl Into<String>, handle: SessionHandle) -> Self {
        Member {
            ip: ip.into(),
            handle,
        }
    }

    /// Member IP - the registry key
    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// Peer identity of the session
    pub fn peer(&self) -> NodeId {
        self.handle.peer()
    }

    /// Close the member's session (send direction, then transport)
    pub async fn close(self) -> PexResult<()> {
        self.handle.close().await
    }
}

impl std::fmt::Debug for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Member")
            .field("ip", &self.ip)
            .field("peer", &self.peer())
            .finish_non_exhaustive()
    }
}

/// Concurrent set of members with an active exchange session.
///
/// There is no unregister: once an IP is claimed its entry lives for the
/// rest of the process, even after the member's stream ends. A member that
/// disconnects therefore stays registered and blocks re-connection
/// attempts for its IP until restart. Any future teardown path must use a
/// single atomic remove-if-present so it cannot race a concurrent
/// `register` for the same IP.
#[derive(Debug, Default)]
pub struct MemberRegistry {
    members: RwLock<HashMap<String, Member>>,
}

impl MemberRegistry {
    pub fn new() -> Self {
        MemberRegistry::default()
    }

    /// Non-blocking membership test
    pub fn is_registered(&self, ip: &str) -> bool {
        self.members.read().contains_key(ip)
    }

    /// Atomically test-and-insert a member.
    ///
    /// Exactly one of any set of concurrent callers for the same IP
    /// succeeds. The rest get the rejected member handed back and must
    /// close it without using it; the stored session is never replaced.
    pub fn register(&self, member: Member) -> Result<(), Member> {
        let mut members = self.members.write();
        if members.contains_key(member.ip()) {
            return Err(member);
        }

        members.insert(member.ip().to_string(), member);
        Ok(())
    }

    /// Peer identity of the registered member for `ip`, if any
    pub fn peer(&self, ip: &str) -> Option<NodeId> {
        self.members.read().get(ip).map(|member| member.peer())
    }

    /// Number of registered members
    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    /// Snapshot of registered member IPs
    pub fn member_ips(&self) -> Vec<String> {
        self.members.read().keys().cloned().collect()
    }
}
