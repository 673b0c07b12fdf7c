// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Node agent: publishes the BGP/BFD session state observed on the local
//! routing daemon as `BgpSessionState` records.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

mod agent;
mod peers;
mod reconcile;
mod store;
mod vtysh;

pub use agent::{
    AgentConfig, AgentError, DEFAULT_PASS_TIMEOUT, DEFAULT_RETRY_DELAY, TriggerQueue,
    WorkerTiming, run_agent, run_worker,
};
pub use peers::{
    DAEMON_DEFAULT_VRF, FetchError, PeerMap, PeerObservation, PeerStateFetcher, normalize_vrfs,
};
pub use reconcile::{
    DEFAULT_RESYNC_INTERVAL, Plan, ReconcileError, SessionStateReconciler, Trigger, plan,
};
pub use store::{KubeStatusStore, StatusStore, StoreError};
pub use vtysh::{BfdPeer, DEFAULT_VTYSH_PATH, VtyshFetcher, parse_bfd_peers, parse_bgp_neighbors};
