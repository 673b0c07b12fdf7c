// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Command line of the routefleet binary

#![deny(clippy::all, clippy::pedantic)]

pub use clap::Parser;
use clap::{Args, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_WEBHOOK_ADDR: &str = "0.0.0.0:9443";
pub const DEFAULT_VTYSH: &str = "/usr/bin/vtysh";

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "routefleet", version, about = "BGP/BFD configuration distribution")]
pub struct CmdArgs {
    /// Log filter directives (e.g. `info` or `routefleet_mgmt=debug,info`). Overrides `RUST_LOG`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

impl CmdArgs {
    #[must_use]
    pub fn log_level(&self) -> Option<&str> {
        self.log_level.as_deref()
    }

    #[must_use]
    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the RoutingConfiguration admission webhook
    Webhook(WebhookArgs),
    /// Run the session state agent of a node
    Agent(AgentArgs),
    /// Print the custom resource definitions as YAML
    Crds,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct WebhookArgs {
    #[arg(long, default_value = DEFAULT_WEBHOOK_ADDR)]
    pub listen: SocketAddr,

    /// PEM certificate chain
    #[arg(long)]
    pub tls_cert: PathBuf,

    /// PEM private key
    #[arg(long)]
    pub tls_key: PathBuf,

    /// Only consider fragments in this namespace (all namespaces if unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Seconds after which a validation is abandoned and the request denied
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,

    #[arg(long, default_value_t = 1024)]
    pub selector_cache_capacity: usize,
}

impl WebhookArgs {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AgentArgs {
    #[arg(long, env = "NODE_NAME")]
    pub node_name: String,

    /// Namespace of the session records, and of the agent pod
    #[arg(long, env = "NAMESPACE")]
    pub namespace: String,

    /// Name of the agent pod, owner of the session records
    #[arg(long, env = "POD_NAME")]
    pub pod_name: String,

    #[arg(long, default_value = DEFAULT_VTYSH)]
    pub vtysh: PathBuf,

    #[arg(long, default_value_t = 60)]
    pub resync_secs: u64,

    #[arg(long, default_value_t = 5)]
    pub retry_secs: u64,

    #[arg(long, default_value_t = 30)]
    pub pass_timeout_secs: u64,
}

impl AgentArgs {
    #[must_use]
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_secs)
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_secs)
    }

    #[must_use]
    pub fn pass_timeout(&self) -> Duration {
        Duration::from_secs(self.pass_timeout_secs)
    }
}
