// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The node agent: watches the node's session records and resync marker, and
//! drives the session state reconciler.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::OptionFuture;
use k8s_intf::client::{WatchError, ensure_node_state, watch_objects};
use k8s_intf::labels::node_selector;
use k8s_intf::{BgpSessionState, NodeState};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::runtime::watcher;
use kube::{Api, Client, Resource};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::peers::PeerStateFetcher;
use crate::reconcile::{DEFAULT_RESYNC_INTERVAL, ReconcileError, SessionStateReconciler, Trigger};
use crate::store::{KubeStatusStore, StatusStore};
use crate::vtysh::VtyshFetcher;

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_PASS_TIMEOUT: Duration = Duration::from_secs(30);

/// Pending reconcile trigger of a node. Holds at most one trigger: pushing
/// while one is pending merges the two.
#[derive(Default)]
pub struct TriggerQueue {
    pending: Mutex<Option<Trigger>>,
    notify: Notify,
}

impl TriggerQueue {
    pub fn push(&self, trigger: Trigger) {
        {
            let mut pending = self.pending.lock();
            *pending = Some(match *pending {
                Some(current) => current.merge(trigger),
                None => trigger,
            });
        }
        self.notify.notify_one();
    }

    /// Wait for a trigger and take it
    pub async fn pop(&self) -> Trigger {
        loop {
            let taken = self.pending.lock().take();
            if let Some(trigger) = taken {
                return trigger;
            }
            self.notify.notified().await;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerTiming {
    pub pass_timeout: Duration,
    pub retry_delay: Duration,
}

impl Default for WorkerTiming {
    fn default() -> Self {
        Self {
            pass_timeout: DEFAULT_PASS_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// A trigger to push back into the queue at a later time
struct Deferred {
    at: Instant,
    trigger: Trigger,
}

fn defer(deferred: &mut Option<Deferred>, at: Instant, trigger: Trigger) {
    *deferred = Some(match deferred.take() {
        Some(d) => Deferred {
            at: d.at.min(at),
            trigger: d.trigger.merge(trigger),
        },
        None => Deferred { at, trigger },
    });
}

/// Consume triggers and run reconcile passes until `cancel` fires.
/// Passes are serialized. Failed passes are retried after
/// `timing.retry_delay`; resync passes ask to be re-run after the resync
/// interval.
pub async fn run_worker<F, S>(
    reconciler: &SessionStateReconciler<F, S>,
    queue: &TriggerQueue,
    timing: WorkerTiming,
    cancel: &CancellationToken,
) where
    F: PeerStateFetcher,
    S: StatusStore,
{
    let mut deferred: Option<Deferred> = None;
    loop {
        let deadline = deferred.as_ref().map(|d| d.at);
        let trigger = tokio::select! {
            () = cancel.cancelled() => {
                debug!("Worker for node {} cancelled", reconciler.node());
                return;
            }
            Some(()) = OptionFuture::from(deadline.map(tokio::time::sleep_until)) => {
                if let Some(d) = deferred.take() {
                    queue.push(d.trigger);
                }
                continue;
            }
            trigger = queue.pop() => trigger,
        };

        let outcome = tokio::select! {
            () = cancel.cancelled() => {
                debug!("Worker for node {} cancelled during a pass", reconciler.node());
                return;
            }
            outcome = tokio::time::timeout(timing.pass_timeout, reconciler.reconcile(trigger)) => {
                outcome.unwrap_or(Err(ReconcileError::Timeout(timing.pass_timeout)))
            }
        };

        match outcome {
            Ok(Some(after)) => defer(&mut deferred, Instant::now() + after, Trigger::Resync),
            Ok(None) => {}
            Err(e) => {
                warn!(
                    "Reconcile of node {} failed, retrying in {:?}: {e}",
                    reconciler.node(),
                    timing.retry_delay
                );
                defer(&mut deferred, Instant::now() + timing.retry_delay, trigger);
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("K8s error: {0}")]
    Kube(#[from] kube::Error),
    #[error("Pod {0} has no uid, cannot own session records")]
    NoOwner(String),
    #[error("Watcher failed: {0}")]
    Watch(#[from] WatchError),
    #[error("Watcher task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub node: String,
    pub namespace: String,
    pub pod_name: String,
    pub vtysh: PathBuf,
    pub resync_interval: Duration,
    pub timing: WorkerTiming,
}

impl AgentConfig {
    #[must_use]
    pub fn new(node: &str, namespace: &str, pod_name: &str) -> Self {
        Self {
            node: node.to_owned(),
            namespace: namespace.to_owned(),
            pod_name: pod_name.to_owned(),
            vtysh: PathBuf::from(crate::vtysh::DEFAULT_VTYSH_PATH),
            resync_interval: DEFAULT_RESYNC_INTERVAL,
            timing: WorkerTiming::default(),
        }
    }
}

/// Owner reference to the agent's own pod
async fn pod_owner_reference(
    client: Client,
    namespace: &str,
    pod_name: &str,
) -> Result<OwnerReference, AgentError> {
    let api: Api<Pod> = Api::namespaced(client, namespace);
    let pod = api.get(pod_name).await?;
    pod.controller_owner_ref(&())
        .ok_or_else(|| AgentError::NoOwner(pod_name.to_owned()))
}

/// Run the agent of one node until `cancel` fires or a watcher ends.
pub async fn run_agent(
    client: Client,
    config: AgentConfig,
    cancel: CancellationToken,
) -> Result<(), AgentError> {
    let node = config.node.clone();
    info!("Starting session state agent for node {node}");

    let owner = pod_owner_reference(client.clone(), &config.namespace, &config.pod_name).await?;
    ensure_node_state(client.clone(), &node).await?;

    let reconciler = SessionStateReconciler::new(
        &node,
        &config.namespace,
        owner,
        VtyshFetcher::new(config.vtysh.clone()),
        KubeStatusStore::new(client.clone(), &config.namespace),
    )
    .with_resync_interval(config.resync_interval);

    let queue = Arc::new(TriggerQueue::default());
    queue.push(Trigger::Startup);

    let records: Api<BgpSessionState> = Api::namespaced(client.clone(), &config.namespace);
    let records_config = watcher::Config::default().labels(&node_selector(&node));
    let q = queue.clone();
    let mut records_watch = Some(tokio::spawn(async move {
        watch_objects(records, records_config, async move |_: &BgpSessionState| {
            q.push(Trigger::StatusRecord);
        })
        .await
    }));

    let markers: Api<NodeState> = Api::all(client);
    let marker_config = watcher::Config::default().fields(&format!("metadata.name={node}"));
    let q = queue.clone();
    let mut marker_watch = Some(tokio::spawn(async move {
        watch_objects(markers, marker_config, async move |_: &NodeState| {
            q.push(Trigger::Resync);
        })
        .await
    }));

    let result = tokio::select! {
        () = run_worker(&reconciler, &queue, config.timing, &cancel) => Ok(()),
        Some(result) = OptionFuture::from(records_watch.as_mut()) => {
            records_watch = None;
            error!("BgpSessionState watcher of node {node} exited");
            result.map_err(AgentError::from).and_then(|r| r.map_err(AgentError::from))
        }
        Some(result) = OptionFuture::from(marker_watch.as_mut()) => {
            marker_watch = None;
            error!("NodeState watcher of node {node} exited");
            result.map_err(AgentError::from).and_then(|r| r.map_err(AgentError::from))
        }
    };

    for handle in [records_watch, marker_watch].into_iter().flatten() {
        handle.abort();
    }
    info!("Session state agent for node {node} stopped");
    result
}
