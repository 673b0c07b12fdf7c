// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Label keys used on `BgpSessionState` objects and the label-safe encoding of
//! peer identifiers.
//!
//! Label values may not contain `:`, so IPv6 peers are stored in their fully
//! expanded form with `-` as the group separator
//! (`fc00::1` -> `fc00-0000-0000-0000-0000-0000-0000-0001`).
//! IPv4 addresses and interface names are stored unchanged.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv6Addr};

/// Node the session belongs to
pub const NODE_LABEL: &str = "routefleet.io/node";
/// Label-encoded peer of the session
pub const PEER_LABEL: &str = "routefleet.io/peer";
/// VRF of the session, empty for the default VRF
pub const VRF_LABEL: &str = "routefleet.io/vrf";

const IPV6_GROUPS: usize = 8;

/// Encode a peer identifier so it can be used as a label value.
#[must_use]
pub fn encode_peer(peer: &str) -> String {
    match peer.parse::<IpAddr>() {
        Ok(IpAddr::V6(addr)) => addr
            .segments()
            .iter()
            .map(|s| format!("{s:04x}"))
            .collect::<Vec<_>>()
            .join("-"),
        Ok(IpAddr::V4(_)) | Err(_) => peer.to_owned(),
    }
}

/// Reverse of [`encode_peer`]. Values that are not an expanded IPv6 address
/// are returned unchanged.
#[must_use]
pub fn decode_peer(label: &str) -> String {
    match parse_expanded_ipv6(label) {
        Some(addr) => addr.to_string(),
        None => label.to_owned(),
    }
}

fn parse_expanded_ipv6(label: &str) -> Option<Ipv6Addr> {
    let mut segments = [0u16; IPV6_GROUPS];
    let mut count = 0;
    for group in label.split('-') {
        if count == IPV6_GROUPS || group.len() != 4 {
            return None;
        }
        segments[count] = u16::from_str_radix(group, 16).ok()?;
        count += 1;
    }
    (count == IPV6_GROUPS).then(|| Ipv6Addr::from(segments))
}

/// The label set identifying the session `(node, peer, vrf)`.
/// `peer` is the raw peer identifier; it is encoded here.
#[must_use]
pub fn session_labels(node: &str, peer: &str, vrf: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (NODE_LABEL.to_owned(), node.to_owned()),
        (PEER_LABEL.to_owned(), encode_peer(peer)),
        (VRF_LABEL.to_owned(), vrf.to_owned()),
    ])
}

/// Label selector string picking all sessions of a node
#[must_use]
pub fn node_selector(node: &str) -> String {
    format!("{NODE_LABEL}={node}")
}
