// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! `BgpSessionState`: the published state of one BGP session, one object per
//! (node, peer, vrf). Objects are identified by their labels; names are
//! generated.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// BFD status published for peers without a BFD session
pub const BFD_STATUS_NOT_AVAILABLE: &str = "N/A";

/// Prefix of generated `BgpSessionState` names
pub const SESSION_STATE_NAME_PREFIX: &str = "bgpsessionstate-";

#[derive(CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[kube(
    group = "routefleet.io",
    version = "v1beta1",
    kind = "BgpSessionState",
    plural = "bgpsessionstates",
    status = "BgpSessionStateStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Node","type":"string","jsonPath":".status.node"}"#,
    printcolumn = r#"{"name":"Peer","type":"string","jsonPath":".status.peer"}"#,
    printcolumn = r#"{"name":"VRF","type":"string","jsonPath":".status.vrf"}"#,
    printcolumn = r#"{"name":"BGP","type":"string","jsonPath":".status.bgpStatus"}"#,
    printcolumn = r#"{"name":"BFD","type":"string","jsonPath":".status.bfdStatus"}"#,
    namespaced
)]
pub struct BgpSessionStateSpec {}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BgpSessionStateStatus {
    #[serde(default)]
    pub node: String,
    /// The peer as reported by the routing daemon (not label-encoded)
    #[serde(default)]
    pub peer: String,
    /// Empty for the default VRF
    #[serde(default)]
    pub vrf: String,
    /// Session phase, e.g. Idle, Connect, Active, Established
    #[serde(default)]
    pub bgp_status: String,
    /// Up, Down or `N/A`
    #[serde(default)]
    pub bfd_status: String,
}
