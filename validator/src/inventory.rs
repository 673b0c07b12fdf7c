// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_intf::RoutingConfiguration;
use k8s_openapi::api::core::v1::Node;
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use tracing::debug;

use crate::errors::InventoryError;

/// The name and labels of a cluster node
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeInfo {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

impl NodeInfo {
    #[must_use]
    pub fn new(name: &str, labels: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_owned(),
            labels: labels
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        }
    }
}

impl From<&Node> for NodeInfo {
    fn from(node: &Node) -> Self {
        Self {
            name: node.name_any(),
            labels: node.labels().clone(),
        }
    }
}

/// Read-only access to the cluster nodes and the configuration fragments.
#[async_trait]
pub trait Inventory: Send + Sync {
    async fn nodes(&self) -> Result<Vec<NodeInfo>, InventoryError>;
    async fn fragments(&self) -> Result<Vec<RoutingConfiguration>, InventoryError>;
}

#[async_trait]
impl<T: Inventory + ?Sized> Inventory for Arc<T> {
    async fn nodes(&self) -> Result<Vec<NodeInfo>, InventoryError> {
        (**self).nodes().await
    }
    async fn fragments(&self) -> Result<Vec<RoutingConfiguration>, InventoryError> {
        (**self).fragments().await
    }
}

/// [`Inventory`] backed by the K8s API. Fragments are listed in `namespace`,
/// or in all namespaces if none is given.
pub struct KubeInventory {
    client: Client,
    namespace: Option<String>,
}

impl KubeInventory {
    #[must_use]
    pub fn new(client: Client, namespace: Option<String>) -> Self {
        Self { client, namespace }
    }
}

#[async_trait]
impl Inventory for KubeInventory {
    async fn nodes(&self) -> Result<Vec<NodeInfo>, InventoryError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api
            .list(&ListParams::default())
            .await
            .map_err(|source| InventoryError::Kube {
                kind: "nodes",
                source,
            })?;
        debug!("Listed {} nodes", nodes.items.len());
        Ok(nodes.items.iter().map(NodeInfo::from).collect())
    }

    async fn fragments(&self) -> Result<Vec<RoutingConfiguration>, InventoryError> {
        let api: Api<RoutingConfiguration> = match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let fragments = api
            .list(&ListParams::default())
            .await
            .map_err(|source| InventoryError::Kube {
                kind: "routing configurations",
                source,
            })?;
        debug!("Listed {} routing configurations", fragments.items.len());
        Ok(fragments.items)
    }
}
