// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! `RoutingConfiguration`: a user-authored fragment of BGP/BFD configuration,
//! applied to the nodes picked by its node selector.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[kube(
    group = "routefleet.io",
    version = "v1beta1",
    kind = "RoutingConfiguration",
    plural = "routingconfigurations",
    shortname = "rcfg",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct RoutingConfigurationSpec {
    /// Nodes this fragment applies to. Absent selects every node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<LabelSelector>,

    /// Router configuration payload
    #[serde(default)]
    pub bgp: BgpConfig,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BgpConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routers: Vec<Router>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bfd_profiles: Vec<BfdProfile>,
}

/// A BGP router instance, one per VRF.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Router {
    pub asn: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Empty or absent is the default VRF
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vrf: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub neighbors: Vec<Neighbor>,

    /// Prefixes advertised by this router, in CIDR notation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prefixes: Vec<String>,
}

/// A BGP neighbor, identified either by address or by local interface
/// (unnumbered BGP). Exactly one of the two must be set.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Neighbor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,

    pub asn: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bfd_profile: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebgp_multihop: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BfdProfile {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_interval: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmit_interval: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detect_multiplier: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub echo_mode: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passive_mode: Option<bool>,
}
