// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Custom resources, label conventions and K8s client helpers shared by the
//! routefleet admission webhook and node agent.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod crd;
pub mod labels;

#[cfg(feature = "client")]
pub mod client;

pub use crd::node_state::{NodeState, NodeStateSpec};
pub use crd::routing_config::{
    BfdProfile, BgpConfig, Neighbor, Router, RoutingConfiguration, RoutingConfigurationSpec,
};
pub use crd::session_state::{BgpSessionState, BgpSessionStateSpec, BgpSessionStateStatus};
