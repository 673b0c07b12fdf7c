// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Peer state fetcher for FRR, through the JSON output of vtysh

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::process::Command;
use tracing::{debug, trace};

use crate::peers::{FetchError, PeerMap, PeerObservation, PeerStateFetcher};

pub const DEFAULT_VTYSH_PATH: &str = "/usr/bin/vtysh";
const SHOW_BGP_NEIGHBORS: &str = "show bgp vrf all neighbors json";
const SHOW_BFD_PEERS: &str = "show bfd vrf all peers json";

/// An entry of `show bfd vrf all peers json`
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct BfdPeer {
    pub peer: String,
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default)]
    pub vrf: String,
    pub status: String,
}

impl BfdPeer {
    fn is(&self, vrf: &str, peer: &str) -> bool {
        self.vrf == vrf && (self.peer == peer || self.interface.as_deref() == Some(peer))
    }
}

/// Parse `show bfd vrf all peers json`
pub fn parse_bfd_peers(output: &str) -> Result<Vec<BfdPeer>, String> {
    if output.trim().is_empty() {
        return Ok(vec![]);
    }
    serde_json::from_str(output).map_err(|e| e.to_string())
}

/// The BGP view reports `Up`, the BFD peer list `up`. Publish `Up`/`Down`.
fn normalize_bfd_status(status: &str) -> String {
    let mut chars = status.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn bfd_status_of(neighbor: &Map<String, Value>) -> Option<String> {
    neighbor
        .get("peerBfdInfo")
        .and_then(|info| info.get("status"))
        .and_then(Value::as_str)
        .map(normalize_bfd_status)
}

/// Parse `show bgp vrf all neighbors json`. The output is keyed by VRF, then by
/// neighbor. BFD status is taken from the neighbor itself if reported there,
/// otherwise from `bfd_peers`.
pub fn parse_bgp_neighbors(output: &str, bfd_peers: &[BfdPeer]) -> Result<PeerMap, String> {
    let root: Value = serde_json::from_str(output).map_err(|e| e.to_string())?;
    let Value::Object(vrfs) = root else {
        return Err("expected an object keyed by VRF".to_string());
    };

    let mut observed = PeerMap::new();
    for (vrf, neighbors) in vrfs {
        let Value::Object(neighbors) = neighbors else {
            return Err(format!("VRF {vrf}: expected an object keyed by neighbor"));
        };
        let mut peers = vec![];
        for (id, neighbor) in &neighbors {
            // vrfId, vrfName and other scalars sit next to the neighbors
            let Value::Object(neighbor) = neighbor else {
                continue;
            };
            let Some(state) = neighbor.get("bgpState").and_then(Value::as_str) else {
                return Err(format!("VRF {vrf}: neighbor {id} has no bgpState"));
            };
            let bfd_status = bfd_status_of(neighbor).or_else(|| {
                bfd_peers
                    .iter()
                    .find(|p| p.is(&vrf, id))
                    .map(|p| normalize_bfd_status(&p.status))
            });
            trace!("VRF {vrf}: neighbor {id} is {state}");
            peers.push(PeerObservation {
                id: id.clone(),
                bgp_state: state.to_owned(),
                bfd_status,
            });
        }
        observed.insert(vrf, peers);
    }
    Ok(observed)
}

/// [`PeerStateFetcher`] running vtysh on the local FRR instance
pub struct VtyshFetcher {
    vtysh: PathBuf,
}

impl Default for VtyshFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_VTYSH_PATH)
    }
}

impl VtyshFetcher {
    pub fn new(vtysh: impl Into<PathBuf>) -> Self {
        Self {
            vtysh: vtysh.into(),
        }
    }

    async fn run(&self, command: &str) -> Result<String, FetchError> {
        let cmd = format!("{} -c \"{command}\"", self.vtysh.display());
        let output = Command::new(&self.vtysh)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| FetchError::Spawn {
                cmd: cmd.clone(),
                source,
            })?;

        if !output.stderr.is_empty() {
            return Err(FetchError::Stderr {
                cmd,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        if !output.status.success() {
            return Err(FetchError::Failed {
                cmd,
                status: output.status.to_string(),
            });
        }
        String::from_utf8(output.stdout).map_err(|e| FetchError::Malformed {
            cmd,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl PeerStateFetcher for VtyshFetcher {
    async fn fetch(&self) -> Result<PeerMap, FetchError> {
        let bfd = self.run(SHOW_BFD_PEERS).await?;
        let bfd_peers = parse_bfd_peers(&bfd).map_err(|reason| FetchError::Malformed {
            cmd: SHOW_BFD_PEERS.to_string(),
            reason,
        })?;
        let bgp = self.run(SHOW_BGP_NEIGHBORS).await?;
        let observed =
            parse_bgp_neighbors(&bgp, &bfd_peers).map_err(|reason| FetchError::Malformed {
                cmd: SHOW_BGP_NEIGHBORS.to_string(),
                reason,
            })?;
        debug!(
            "Observed {} peers in {} VRFs",
            observed.values().map(Vec::len).sum::<usize>(),
            observed.len()
        );
        Ok(observed)
    }
}
