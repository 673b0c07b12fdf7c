// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::fmt::Debug;

use futures::{StreamExt, TryStreamExt};
use kube::api::PostParams;
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use crate::crd::node_state::{NodeState, NodeStateSpec};

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Client error: {0}")]
    ClientError(#[from] kube::Error),
    #[error("Watch stream for {0} ended")]
    StreamEnded(String),
}

/// True if the error is an API error with HTTP code 404
#[must_use]
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}

/// True if the error is an API error with HTTP code 409
#[must_use]
pub fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 409)
}

/// Build a client from the in-cluster environment or the local kubeconfig.
pub async fn default_client() -> Result<Client, WatchError> {
    Ok(Client::try_default().await?)
}

/// Watch objects of type `K` and call `callback` for every object created,
/// modified or deleted. Watch errors are logged and the watch is restarted
/// with the default backoff. Only returns if the underlying stream ends.
pub async fn watch_objects<K>(
    api: Api<K>,
    config: watcher::Config,
    callback: impl AsyncFn(&K),
) -> Result<(), WatchError>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
    K::DynamicType: Default,
{
    let kind = K::kind(&K::DynamicType::default()).to_string();
    info!("Starting K8s {kind} watcher");

    let mut stream = watcher(api, config)
        .default_backoff()
        .touched_objects()
        .boxed();

    loop {
        match stream.try_next().await {
            Ok(Some(obj)) => {
                debug!("{kind} {} changed", obj.name_any());
                callback(&obj).await;
            }
            Ok(None) => return Err(WatchError::StreamEnded(kind)),
            Err(err) => {
                error!("Watcher error: {err}");
            }
        }
    }
}

/// Create the `NodeState` for `node` unless it already exists.
pub async fn ensure_node_state(client: Client, node: &str) -> Result<(), kube::Error> {
    let api: Api<NodeState> = Api::all(client);
    let marker = NodeState::new(node, NodeStateSpec {});
    match api.create(&PostParams::default(), &marker).await {
        Ok(_) => {
            info!("Created NodeState {node}");
            Ok(())
        }
        Err(e) if is_conflict(&e) => {
            debug!("NodeState {node} already exists");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
