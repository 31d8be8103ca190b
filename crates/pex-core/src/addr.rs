//! Address normalization helpers
//!
//! Gossip engines report addresses in several shapes (bare IP, host:port,
//! bracketed IPv6). These helpers reduce them to the canonical forms the
//! rest of the protocol works with.

use std::net::IpAddr;

use crate::{PexError, PexResult};

/// Parse and normalize a member IP into its canonical form.
pub fn format_ip(raw: &str) -> PexResult<IpAddr> {
    raw.trim()
        .parse::<IpAddr>()
        .map_err(|_| PexError::AddressFormat(raw.to_string()))
}

/// Extract the host component of a gossip-reported network address.
///
/// Accepts bare IPs (`10.0.0.5`), host:port pairs (`10.0.0.5:7001`),
/// bare IPv6 (`::1`) and bracketed IPv6 with port (`[::1]:7001`).
pub fn host_component(addr: &str) -> &str {
    if let Some(rest) = addr.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            return &rest[..end];
        }
    }

    match addr.rsplit_once(':') {
        // A host with its own ':' and no brackets is a bare IPv6 address
        Some((host, _)) if !host.contains(':') => host,
        _ => addr,
    }
}
