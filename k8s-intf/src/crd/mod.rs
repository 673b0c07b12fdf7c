// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Custom resource definitions in the `routefleet.io` API group.

pub mod node_state;
pub mod routing_config;
pub mod session_state;

use kube::CustomResourceExt;

/// API group of all routefleet custom resources
pub const API_GROUP: &str = "routefleet.io";

/// Served version of all routefleet custom resources
pub const API_VERSION: &str = "v1beta1";

/// Render all custom resource definitions as a multi-document YAML string.
pub fn crds_as_yaml() -> Result<String, serde_yaml_ng::Error> {
    let docs = [
        serde_yaml_ng::to_string(&routing_config::RoutingConfiguration::crd())?,
        serde_yaml_ng::to_string(&session_state::BgpSessionState::crd())?,
        serde_yaml_ng::to_string(&node_state::NodeState::crd())?,
    ];
    Ok(docs.join("---\n"))
}
