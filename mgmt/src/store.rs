// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Access to the published `BgpSessionState` records of a node

use std::sync::Arc;

use async_trait::async_trait;
use k8s_intf::BgpSessionState;
use k8s_intf::client::is_not_found;
use k8s_intf::labels::node_selector;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to {op} BgpSessionState {name}: {source}")]
    Kube {
        op: &'static str,
        name: String,
        source: kube::Error,
    },
    #[error("Store rejected {0}")]
    Rejected(String),
}

/// Storage of session status records
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// All records labeled for `node`
    async fn list(&self, node: &str) -> Result<Vec<BgpSessionState>, StoreError>;
    /// Delete a record. Deleting a record that no longer exists succeeds.
    async fn remove(&self, record: &BgpSessionState) -> Result<(), StoreError>;
    /// Create a record without a name, or replace the named one. Status included.
    async fn upsert(&self, record: &BgpSessionState) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: StatusStore + ?Sized> StatusStore for Arc<T> {
    async fn list(&self, node: &str) -> Result<Vec<BgpSessionState>, StoreError> {
        (**self).list(node).await
    }
    async fn remove(&self, record: &BgpSessionState) -> Result<(), StoreError> {
        (**self).remove(record).await
    }
    async fn upsert(&self, record: &BgpSessionState) -> Result<(), StoreError> {
        (**self).upsert(record).await
    }
}

/// [`StatusStore`] backed by the K8s API, in a single namespace
pub struct KubeStatusStore {
    api: Api<BgpSessionState>,
}

impl KubeStatusStore {
    #[must_use]
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
        }
    }

    async fn patch_status(&self, name: &str, record: &BgpSessionState) -> Result<(), StoreError> {
        let patch = json!({ "status": record.status });
        self.api
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|source| StoreError::Kube {
                op: "update status of",
                name: name.to_owned(),
                source,
            })?;
        Ok(())
    }
}

#[async_trait]
impl StatusStore for KubeStatusStore {
    async fn list(&self, node: &str) -> Result<Vec<BgpSessionState>, StoreError> {
        let selector = node_selector(node);
        let records = self
            .api
            .list(&ListParams::default().labels(&selector))
            .await
            .map_err(|source| StoreError::Kube {
                op: "list",
                name: selector,
                source,
            })?;
        Ok(records.items)
    }

    async fn remove(&self, record: &BgpSessionState) -> Result<(), StoreError> {
        let name = record.name_any();
        match self.api.delete(&name, &DeleteParams::default()).await {
            Ok(_) => {
                debug!("Deleted BgpSessionState {name}");
                Ok(())
            }
            Err(e) if is_not_found(&e) => {
                debug!("BgpSessionState {name} was already gone");
                Ok(())
            }
            Err(source) => Err(StoreError::Kube {
                op: "delete",
                name,
                source,
            }),
        }
    }

    async fn upsert(&self, record: &BgpSessionState) -> Result<(), StoreError> {
        let name = match &record.metadata.name {
            Some(name) => {
                self.api
                    .replace(name, &PostParams::default(), record)
                    .await
                    .map_err(|source| StoreError::Kube {
                        op: "replace",
                        name: name.clone(),
                        source,
                    })?;
                name.clone()
            }
            None => {
                let created = self
                    .api
                    .create(&PostParams::default(), record)
                    .await
                    .map_err(|source| StoreError::Kube {
                        op: "create",
                        name: record.name_any(),
                        source,
                    })?;
                created.name_any()
            }
        };
        debug!("Wrote BgpSessionState {name}");
        self.patch_status(&name, record).await
    }
}
