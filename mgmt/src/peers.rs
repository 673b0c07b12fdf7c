// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Peer session state as observed on the local routing daemon

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

/// Name the routing daemon gives to the default VRF
pub const DAEMON_DEFAULT_VRF: &str = "default";

/// One BGP peer as seen by the routing daemon
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerObservation {
    /// IP address or interface name of the peer
    pub id: String,
    /// Session phase (Idle, Connect, Active, OpenSent, OpenConfirm, Established)
    pub bgp_state: String,
    pub bfd_status: Option<String>,
}

impl PeerObservation {
    #[must_use]
    pub fn new(id: &str, bgp_state: &str, bfd_status: Option<&str>) -> Self {
        Self {
            id: id.to_owned(),
            bgp_state: bgp_state.to_owned(),
            bfd_status: bfd_status.map(str::to_owned),
        }
    }
}

/// Observed peers, keyed by VRF name
pub type PeerMap = BTreeMap<String, Vec<PeerObservation>>;

/// Rename the daemon's default VRF to the cluster's empty VRF name.
///
/// If the map has both an empty and a `default` entry, the `default` one is kept.
#[must_use]
pub fn normalize_vrfs(observed: PeerMap) -> PeerMap {
    // BTreeMap iterates "" before "default", so the latter overwrites
    let mut normalized = PeerMap::new();
    for (vrf, peers) in observed {
        let vrf = if vrf == DAEMON_DEFAULT_VRF {
            String::new()
        } else {
            vrf
        };
        normalized.insert(vrf, peers);
    }
    normalized
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to run {cmd}: {source}")]
    Spawn {
        cmd: String,
        source: std::io::Error,
    },
    #[error("Command {cmd} exited with {status}")]
    Failed { cmd: String, status: String },
    #[error("Command {cmd} printed an error message: {stderr}")]
    Stderr { cmd: String, stderr: String },
    #[error("Malformed output from {cmd}: {reason}")]
    Malformed { cmd: String, reason: String },
    #[error("Routing daemon unavailable: {0}")]
    Unavailable(String),
}

/// Source of the peer state of the local node
#[async_trait]
pub trait PeerStateFetcher: Send + Sync {
    async fn fetch(&self) -> Result<PeerMap, FetchError>;
}

#[async_trait]
impl<T: PeerStateFetcher + ?Sized> PeerStateFetcher for Arc<T> {
    async fn fetch(&self) -> Result<PeerMap, FetchError> {
        (**self).fetch().await
    }
}
