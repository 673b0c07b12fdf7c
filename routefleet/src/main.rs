// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]

use std::process::ExitCode;
use std::sync::Arc;

use args::{AgentArgs, CmdArgs, Command, Parser, WebhookArgs};
use k8s_intf::client::{WatchError, default_client};
use mgmt::{AgentConfig, AgentError, WorkerTiming, run_agent};
use selector::SelectorCache;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use validator::webhook::{WebhookConfig, WebhookError, WebhookState, serve};
use validator::{ConflictValidator, KubeInventory, RouterConfigValidator};

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error("Failed to create K8s client: {0}")]
    Client(#[from] WatchError),
    #[error("Failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("Failed to render CRDs: {0}")]
    Crds(#[from] serde_yaml_ng::Error),
    #[error(transparent)]
    Webhook(#[from] WebhookError),
    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Cancel `token` on SIGINT or SIGTERM
async fn cancel_on_signal(token: CancellationToken) {
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
        () = terminate => info!("Received SIGTERM"),
    }
    token.cancel();
}

async fn run_webhook(args: &WebhookArgs, cancel: CancellationToken) -> Result<(), RunError> {
    let client = default_client().await?;
    let validator = ConflictValidator::new(
        KubeInventory::new(client, args.namespace.clone()),
        RouterConfigValidator,
        Arc::new(SelectorCache::new(args.selector_cache_capacity)),
    );
    let state = Arc::new(WebhookState::new(validator, args.timeout()));
    let config = WebhookConfig {
        addr: args.listen,
        cert: args.tls_cert.clone(),
        key: args.tls_key.clone(),
    };
    serve(&config, state, cancel).await?;
    Ok(())
}

async fn run_node_agent(args: &AgentArgs, cancel: CancellationToken) -> Result<(), RunError> {
    let client = default_client().await?;
    let mut config = AgentConfig::new(&args.node_name, &args.namespace, &args.pod_name);
    config.vtysh.clone_from(&args.vtysh);
    config.resync_interval = args.resync_interval();
    config.timing = WorkerTiming {
        pass_timeout: args.pass_timeout(),
        retry_delay: args.retry_delay(),
    };
    run_agent(client, config, cancel).await?;
    Ok(())
}

fn run(args: &CmdArgs) -> Result<(), RunError> {
    if let Command::Crds = args.command() {
        print!("{}", k8s_intf::crd::crds_as_yaml()?);
        return Ok(());
    }

    // kube and axum-server both use rustls; pick the provider once for the process
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("routefleet")
        .build()?;

    runtime.block_on(async {
        let cancel = CancellationToken::new();
        tokio::spawn(cancel_on_signal(cancel.clone()));
        match args.command() {
            Command::Webhook(webhook) => run_webhook(webhook, cancel).await,
            Command::Agent(agent) => run_node_agent(agent, cancel).await,
            Command::Crds => Ok(()),
        }
    })
}

fn main() -> ExitCode {
    let args = CmdArgs::parse();
    if let Err(e) = tracectl::init(args.log_level()) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }
    info!(
        " ━━━━━━ routefleet {} started ━━━━━━",
        env!("CARGO_PKG_VERSION")
    );

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
