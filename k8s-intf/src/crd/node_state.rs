// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! `NodeState`: a cluster-scoped object named after each node. Changes to it
//! force the node agent to re-publish its session states.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Clone, Debug, Default, Deserialize, PartialEq, Serialize, JsonSchema)]
#[kube(
    group = "routefleet.io",
    version = "v1beta1",
    kind = "NodeState",
    plural = "nodestates"
)]
pub struct NodeStateSpec {}
