// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Reconciliation of the observed peer state of a node with its published
//! `BgpSessionState` records.
//!
//! Every pass lists the records of the node, fetches the peer state, and
//! computes the records to remove (stale and duplicate ones) and the records
//! to create or update. Removals are applied before upserts. A pass with
//! unchanged observations writes nothing.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use k8s_intf::crd::session_state::{BFD_STATUS_NOT_AVAILABLE, SESSION_STATE_NAME_PREFIX};
use k8s_intf::labels::{PEER_LABEL, VRF_LABEL, decode_peer, encode_peer, session_labels};
use k8s_intf::{BgpSessionState, BgpSessionStateSpec, BgpSessionStateStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::ResourceExt;
use tracing::{debug, info, warn};

use crate::peers::{FetchError, PeerMap, PeerStateFetcher, normalize_vrfs};
use crate::store::{StatusStore, StoreError};

pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(60);

/// What caused a reconcile pass
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Trigger {
    /// A status record of the node changed
    StatusRecord,
    /// The agent started
    Startup,
    /// The node's resync marker changed, or the resync interval elapsed
    Resync,
}

impl Trigger {
    /// Collapse two pending triggers into one
    #[must_use]
    pub fn merge(self, other: Trigger) -> Trigger {
        self.max(other)
    }
}

fn join_errors(errors: &[StoreError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Failed to list session records: {0}")]
    List(#[source] StoreError),
    #[error("Failed to fetch peer state: {0}")]
    Fetch(#[from] FetchError),
    #[error("{count} session record writes failed: {details}", count = .0.len(), details = join_errors(.0))]
    WriteFailure(Vec<StoreError>),
    #[error("Reconcile pass did not complete within {0:?}")]
    Timeout(Duration),
}

/// Writes needed to converge
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Plan {
    pub remove: Vec<BgpSessionState>,
    pub apply: Vec<BgpSessionState>,
}

impl Plan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.apply.is_empty()
    }
}

fn label(record: &BgpSessionState, key: &str) -> String {
    record.labels().get(key).cloned().unwrap_or_default()
}

fn labels_match(record: &BgpSessionState, desired: &BTreeMap<String, String>) -> bool {
    let labels = record.labels();
    desired.iter().all(|(k, v)| labels.get(k) == Some(v))
}

/// Compute the writes converging `existing` records of `node` to `observed`.
/// `observed` must already have normalized VRF names.
#[must_use]
pub fn plan(
    node: &str,
    namespace: &str,
    owner: &OwnerReference,
    mut existing: Vec<BgpSessionState>,
    observed: &PeerMap,
) -> Plan {
    let mut plan = Plan::default();

    existing.sort_by_cached_key(|r| r.metadata.name.clone().unwrap_or_default());
    let mut current: BTreeMap<(String, String), BgpSessionState> = BTreeMap::new();
    for record in existing {
        let key = (label(&record, VRF_LABEL), label(&record, PEER_LABEL));
        if current.contains_key(&key) {
            debug!("Duplicate session record {}", record.name_any());
            plan.remove.push(record);
        } else {
            current.insert(key, record);
        }
    }

    let mut seen = BTreeSet::new();
    for (vrf, peers) in observed {
        for peer in peers {
            let key = (vrf.clone(), encode_peer(&peer.id));
            if !seen.insert(key.clone()) {
                warn!("Peer {} reported twice in VRF '{vrf}'", peer.id);
                continue;
            }
            let labels = session_labels(node, &peer.id, vrf);
            let status = BgpSessionStateStatus {
                node: node.to_owned(),
                peer: peer.id.clone(),
                vrf: vrf.clone(),
                bgp_status: peer.bgp_state.clone(),
                bfd_status: peer
                    .bfd_status
                    .clone()
                    .unwrap_or_else(|| BFD_STATUS_NOT_AVAILABLE.to_owned()),
            };

            let desired = match current.remove(&key) {
                Some(record)
                    if labels_match(&record, &labels)
                        && record.status.as_ref() == Some(&status) =>
                {
                    continue;
                }
                Some(mut record) => {
                    record.labels_mut().extend(labels);
                    record.metadata.owner_references = Some(vec![owner.clone()]);
                    record.status = Some(status);
                    record
                }
                None => BgpSessionState {
                    metadata: ObjectMeta {
                        generate_name: Some(SESSION_STATE_NAME_PREFIX.to_owned()),
                        namespace: Some(namespace.to_owned()),
                        labels: Some(labels),
                        owner_references: Some(vec![owner.clone()]),
                        ..Default::default()
                    },
                    spec: BgpSessionStateSpec {},
                    status: Some(status),
                },
            };
            plan.apply.push(desired);
        }
    }

    for ((vrf, peer), record) in current {
        debug!(
            "Stale session record {} for peer {} in VRF '{vrf}'",
            record.name_any(),
            decode_peer(&peer)
        );
        plan.remove.push(record);
    }
    plan
}

/// Publishes the peer state of one node as `BgpSessionState` records
pub struct SessionStateReconciler<F, S> {
    node: String,
    namespace: String,
    owner: OwnerReference,
    fetcher: F,
    store: S,
    resync_interval: Duration,
}

impl<F: PeerStateFetcher, S: StatusStore> SessionStateReconciler<F, S> {
    pub fn new(node: &str, namespace: &str, owner: OwnerReference, fetcher: F, store: S) -> Self {
        Self {
            node: node.to_owned(),
            namespace: namespace.to_owned(),
            owner,
            fetcher,
            store,
            resync_interval: DEFAULT_RESYNC_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = interval;
        self
    }

    #[must_use]
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Run one pass. On success, returns when the next pass should be run
    /// regardless of other triggers, if at all.
    pub async fn reconcile(&self, trigger: Trigger) -> Result<Option<Duration>, ReconcileError> {
        debug!("Reconciling sessions of node {} ({trigger:?})", self.node);

        let existing = self
            .store
            .list(&self.node)
            .await
            .map_err(ReconcileError::List)?;
        let observed = normalize_vrfs(self.fetcher.fetch().await?);

        let plan = plan(&self.node, &self.namespace, &self.owner, existing, &observed);
        if !plan.is_empty() {
            info!(
                "Node {}: removing {} and writing {} session records",
                self.node,
                plan.remove.len(),
                plan.apply.len()
            );
        }

        let mut errors = vec![];
        for record in &plan.remove {
            if let Err(e) = self.store.remove(record).await {
                errors.push(e);
            }
        }
        for record in &plan.apply {
            if let Err(e) = self.store.upsert(record).await {
                errors.push(e);
            }
        }
        if !errors.is_empty() {
            return Err(ReconcileError::WriteFailure(errors));
        }

        Ok((trigger == Trigger::Resync).then_some(self.resync_interval))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::peers::PeerObservation;
    use async_trait::async_trait;
    use k8s_intf::labels::NODE_LABEL;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tracing_test::traced_test;

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub(crate) enum Write {
        Remove(String),
        Upsert(String),
    }

    #[derive(Default)]
    pub(crate) struct FakeStore {
        pub(crate) records: Mutex<BTreeMap<String, BgpSessionState>>,
        pub(crate) writes: Mutex<Vec<Write>>,
        pub(crate) failing: Mutex<BTreeSet<String>>,
        pub(crate) unavailable: Mutex<bool>,
        next: Mutex<u32>,
    }

    impl FakeStore {
        pub(crate) fn insert(&self, name: &str, record: BgpSessionState) {
            let mut record = record;
            record.metadata.name = Some(name.to_owned());
            self.records.lock().insert(name.to_owned(), record);
        }

        pub(crate) fn take_writes(&self) -> Vec<Write> {
            std::mem::take(&mut *self.writes.lock())
        }

        pub(crate) fn statuses(&self) -> Vec<BgpSessionStateStatus> {
            self.records
                .lock()
                .values()
                .filter_map(|r| r.status.clone())
                .collect()
        }
    }

    #[async_trait]
    impl StatusStore for FakeStore {
        async fn list(&self, node: &str) -> Result<Vec<BgpSessionState>, StoreError> {
            if *self.unavailable.lock() {
                return Err(StoreError::Rejected("list".to_string()));
            }
            Ok(self
                .records
                .lock()
                .values()
                .filter(|r| r.labels().get(NODE_LABEL).map(String::as_str) == Some(node))
                .cloned()
                .collect())
        }

        async fn remove(&self, record: &BgpSessionState) -> Result<(), StoreError> {
            let name = record.name_any();
            self.writes.lock().push(Write::Remove(name.clone()));
            if self.failing.lock().contains(&name) {
                return Err(StoreError::Rejected(name));
            }
            self.records.lock().remove(&name);
            Ok(())
        }

        async fn upsert(&self, record: &BgpSessionState) -> Result<(), StoreError> {
            let name = match &record.metadata.name {
                Some(name) => name.clone(),
                None => {
                    let mut next = self.next.lock();
                    *next += 1;
                    format!("{SESSION_STATE_NAME_PREFIX}{:05}", *next)
                }
            };
            self.writes.lock().push(Write::Upsert(name.clone()));
            if self.failing.lock().contains(&name) {
                return Err(StoreError::Rejected(name));
            }
            let mut record = record.clone();
            record.metadata.name = Some(name.clone());
            self.records.lock().insert(name, record);
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeFetcher {
        pub(crate) observed: Mutex<Option<PeerMap>>,
    }

    impl FakeFetcher {
        pub(crate) fn with(observed: PeerMap) -> Self {
            Self {
                observed: Mutex::new(Some(observed)),
            }
        }
    }

    #[async_trait]
    impl PeerStateFetcher for FakeFetcher {
        async fn fetch(&self) -> Result<PeerMap, FetchError> {
            self.observed
                .lock()
                .clone()
                .ok_or_else(|| FetchError::Unavailable("daemon down".to_string()))
        }
    }

    pub(crate) fn owner() -> OwnerReference {
        OwnerReference {
            api_version: "v1".to_string(),
            kind: "Pod".to_string(),
            name: "agent-x7k2p".to_string(),
            uid: "3f1c2a9e-0d4b-4e8f-9a51-7c2b6d0e8f13".to_string(),
            controller: Some(true),
            block_owner_deletion: None,
        }
    }

    pub(crate) type TestReconciler = SessionStateReconciler<Arc<FakeFetcher>, Arc<FakeStore>>;

    pub(crate) fn reconciler(fetcher: &Arc<FakeFetcher>, store: &Arc<FakeStore>) -> TestReconciler {
        SessionStateReconciler::new("n1", "fabric", owner(), fetcher.clone(), store.clone())
            .with_resync_interval(Duration::from_secs(30))
    }

    pub(crate) fn record(node: &str, peer: &str, vrf: &str, bgp: &str, bfd: &str) -> BgpSessionState {
        BgpSessionState {
            metadata: ObjectMeta {
                namespace: Some("fabric".to_string()),
                labels: Some(session_labels(node, peer, vrf)),
                ..Default::default()
            },
            spec: BgpSessionStateSpec {},
            status: Some(BgpSessionStateStatus {
                node: node.to_string(),
                peer: peer.to_string(),
                vrf: vrf.to_string(),
                bgp_status: bgp.to_string(),
                bfd_status: bfd.to_string(),
            }),
        }
    }

    fn example() -> PeerMap {
        PeerMap::from([
            (
                "default".to_string(),
                vec![PeerObservation::new("10.0.0.1", "Established", Some("Up"))],
            ),
            (
                "red".to_string(),
                vec![PeerObservation::new("fc00::1", "Idle", None)],
            ),
        ])
    }

    #[tokio::test]
    async fn test_convergence() {
        let fetcher = Arc::new(FakeFetcher::with(example()));
        let store = Arc::new(FakeStore::default());
        let r = reconciler(&fetcher, &store);

        assert_eq!(r.reconcile(Trigger::Startup).await.unwrap(), None);

        let records: Vec<BgpSessionState> = store.records.lock().values().cloned().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(
            store.statuses(),
            vec![
                BgpSessionStateStatus {
                    node: "n1".to_string(),
                    peer: "10.0.0.1".to_string(),
                    vrf: String::new(),
                    bgp_status: "Established".to_string(),
                    bfd_status: "Up".to_string(),
                },
                BgpSessionStateStatus {
                    node: "n1".to_string(),
                    peer: "fc00::1".to_string(),
                    vrf: "red".to_string(),
                    bgp_status: "Idle".to_string(),
                    bfd_status: BFD_STATUS_NOT_AVAILABLE.to_string(),
                },
            ]
        );
        let red = &records[1];
        assert_eq!(
            red.labels().get(PEER_LABEL).map(String::as_str),
            Some("fc00-0000-0000-0000-0000-0000-0000-0001")
        );
        assert_eq!(red.labels().get(VRF_LABEL).map(String::as_str), Some("red"));
        assert_eq!(records[0].labels().get(VRF_LABEL).map(String::as_str), Some(""));
        assert!(
            records
                .iter()
                .all(|r| r.metadata.owner_references == Some(vec![owner()]))
        );
        assert!(
            records
                .iter()
                .all(|r| r.name_any().starts_with(SESSION_STATE_NAME_PREFIX))
        );
    }

    #[test]
    fn test_plan_keeps_first_name_and_drops_the_rest() {
        let named = |name: &str, bgp: &str| {
            let mut r = record("n1", "10.0.0.1", "", bgp, "Up");
            r.metadata.name = Some(name.to_string());
            r
        };
        let observed = PeerMap::from([(
            String::new(),
            vec![PeerObservation::new("10.0.0.1", "Established", Some("Up"))],
        )]);
        let existing = vec![
            named("bgpsessionstate-b", "Idle"),
            named("bgpsessionstate-a", "Established"),
        ];

        let repaired = plan("n1", "fabric", &owner(), existing, &observed);
        assert_eq!(
            repaired,
            Plan {
                remove: vec![named("bgpsessionstate-b", "Idle")],
                apply: vec![],
            }
        );

        let cleared = plan("n1", "fabric", &owner(), vec![named("x", "Idle")], &PeerMap::new());
        assert_eq!(cleared.remove, vec![named("x", "Idle")]);
        assert!(cleared.apply.is_empty());
    }

    #[test]
    #[traced_test]
    fn test_stale_records_are_logged_with_decoded_peer() {
        let stale = record("n1", "fc00::1", "red", "Idle", "N/A");
        let plan = plan("n1", "fabric", &owner(), vec![stale.clone()], &PeerMap::new());
        assert_eq!(plan.remove, vec![stale]);
        assert!(logs_contain("for peer fc00::1 in VRF 'red'"));
    }

    #[tokio::test]
    async fn test_second_pass_writes_nothing() {
        let fetcher = Arc::new(FakeFetcher::with(example()));
        let store = Arc::new(FakeStore::default());
        let r = reconciler(&fetcher, &store);

        r.reconcile(Trigger::Startup).await.unwrap();
        assert_eq!(store.take_writes().len(), 2);
        r.reconcile(Trigger::StatusRecord).await.unwrap();
        assert_eq!(store.take_writes(), vec![]);
    }

    #[tokio::test]
    async fn test_duplicate_repair() {
        let fetcher = Arc::new(FakeFetcher::with(PeerMap::from([(
            "default".to_string(),
            vec![PeerObservation::new("10.0.0.1", "Established", Some("Up"))],
        )])));
        let store = Arc::new(FakeStore::default());
        store.insert("bgpsessionstate-b", record("n1", "10.0.0.1", "", "Idle", "Down"));
        store.insert("bgpsessionstate-a", record("n1", "10.0.0.1", "", "Idle", "Down"));
        let r = reconciler(&fetcher, &store);

        r.reconcile(Trigger::StatusRecord).await.unwrap();
        assert_eq!(
            store.take_writes(),
            vec![
                Write::Remove("bgpsessionstate-b".to_string()),
                Write::Upsert("bgpsessionstate-a".to_string()),
            ]
        );
        assert_eq!(store.statuses()[0].bgp_status, "Established");
    }

    #[tokio::test]
    async fn test_stale_removal() {
        let fetcher = Arc::new(FakeFetcher::with(PeerMap::new()));
        let store = Arc::new(FakeStore::default());
        store.insert("bgpsessionstate-a", record("n1", "10.0.0.9", "", "Established", "N/A"));
        store.insert("bgpsessionstate-o", record("n2", "10.0.0.9", "", "Established", "N/A"));
        let r = reconciler(&fetcher, &store);

        r.reconcile(Trigger::StatusRecord).await.unwrap();
        assert_eq!(
            store.take_writes(),
            vec![Write::Remove("bgpsessionstate-a".to_string())]
        );
        // records of other nodes are never touched
        assert_eq!(store.records.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_vrf_without_peers_is_cleared() {
        let fetcher = Arc::new(FakeFetcher::with(PeerMap::from([
            ("red".to_string(), vec![]),
            (
                "blue".to_string(),
                vec![PeerObservation::new("10.2.0.1", "Established", None)],
            ),
        ])));
        let store = Arc::new(FakeStore::default());
        store.insert("bgpsessionstate-r", record("n1", "10.1.0.1", "red", "Established", "N/A"));
        store.insert("bgpsessionstate-b", record("n1", "10.2.0.1", "blue", "Established", "N/A"));
        let r = reconciler(&fetcher, &store);

        r.reconcile(Trigger::StatusRecord).await.unwrap();
        assert_eq!(
            store.take_writes(),
            vec![Write::Remove("bgpsessionstate-r".to_string())]
        );
    }

    #[tokio::test]
    async fn test_removals_precede_upserts() {
        let fetcher = Arc::new(FakeFetcher::with(example()));
        let store = Arc::new(FakeStore::default());
        store.insert("bgpsessionstate-z", record("n1", "10.9.9.9", "", "Established", "N/A"));
        let r = reconciler(&fetcher, &store);

        r.reconcile(Trigger::Startup).await.unwrap();
        let writes = store.take_writes();
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[0], Write::Remove("bgpsessionstate-z".to_string()));
        assert!(writes[1..].iter().all(|w| matches!(w, Write::Upsert(_))));
    }

    #[tokio::test]
    async fn test_peer_reported_twice_is_applied_once() {
        let fetcher = Arc::new(FakeFetcher::with(PeerMap::from([(
            "default".to_string(),
            vec![
                PeerObservation::new("10.0.0.1", "Established", None),
                PeerObservation::new("10.0.0.1", "Idle", None),
            ],
        )])));
        let store = Arc::new(FakeStore::default());
        let r = reconciler(&fetcher, &store);

        r.reconcile(Trigger::Startup).await.unwrap();
        assert_eq!(store.take_writes().len(), 1);
        assert_eq!(store.statuses()[0].bgp_status, "Established");
    }

    #[tokio::test]
    async fn test_write_errors_are_aggregated() {
        let fetcher = Arc::new(FakeFetcher::with(PeerMap::from([(
            "default".to_string(),
            vec![
                PeerObservation::new("10.0.0.1", "Established", None),
                PeerObservation::new("10.0.0.2", "Established", None),
            ],
        )])));
        let store = Arc::new(FakeStore::default());
        store.insert("bgpsessionstate-x", record("n1", "10.0.0.9", "", "Idle", "N/A"));
        store.insert("bgpsessionstate-y", record("n1", "10.0.0.2", "", "Idle", "N/A"));
        store
            .failing
            .lock()
            .extend(["bgpsessionstate-x".to_string(), "bgpsessionstate-y".to_string()]);
        let r = reconciler(&fetcher, &store);

        let Err(ReconcileError::WriteFailure(errors)) = r.reconcile(Trigger::Startup).await else {
            panic!("expected a write failure");
        };
        assert_eq!(errors.len(), 2);
        // the remaining write still went through
        assert_eq!(store.take_writes().len(), 3);
        assert!(store.statuses().iter().any(|s| s.peer == "10.0.0.1"));
    }

    #[tokio::test]
    async fn test_resync_requests_requeue() {
        let fetcher = Arc::new(FakeFetcher::with(PeerMap::new()));
        let store = Arc::new(FakeStore::default());
        let r = reconciler(&fetcher, &store);
        assert_eq!(
            r.reconcile(Trigger::Resync).await.unwrap(),
            Some(Duration::from_secs(30))
        );
        assert_eq!(r.reconcile(Trigger::StatusRecord).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failures_before_writes() {
        let fetcher = Arc::new(FakeFetcher::default());
        let store = Arc::new(FakeStore::default());
        store.insert("bgpsessionstate-a", record("n1", "10.0.0.9", "", "Established", "N/A"));
        let r = reconciler(&fetcher, &store);

        assert!(matches!(
            r.reconcile(Trigger::Startup).await,
            Err(ReconcileError::Fetch(_))
        ));
        *store.unavailable.lock() = true;
        assert!(matches!(
            r.reconcile(Trigger::Startup).await,
            Err(ReconcileError::List(_))
        ));
        assert_eq!(store.take_writes(), vec![]);
    }

    #[test]
    fn test_trigger_merge() {
        use Trigger::{Resync, Startup, StatusRecord};
        assert_eq!(StatusRecord.merge(Startup), Startup);
        assert_eq!(Startup.merge(StatusRecord), Startup);
        assert_eq!(Resync.merge(Startup), Resync);
        assert_eq!(StatusRecord.merge(Resync), Resync);
        assert_eq!(StatusRecord.merge(StatusRecord), StatusRecord);
    }
}
