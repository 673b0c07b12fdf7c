// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Validating admission webhook for `RoutingConfiguration` objects

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use k8s_intf::RoutingConfiguration;
use kube::core::DynamicObject;
use kube::core::admission::{
    AdmissionRequest, AdmissionResponse, AdmissionReview, Operation as AdmissionOperation,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::conflict::{ConflictValidator, Operation};
use crate::errors::ValidationError;
use crate::inventory::Inventory;
use crate::semantic::SemanticValidator;

pub const VALIDATE_PATH: &str = "/validate-routingconfiguration";
pub const HEALTHZ_PATH: &str = "/healthz";
pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Failed to load TLS certificate or key: {0}")]
    Tls(std::io::Error),
    #[error("Webhook server failed: {0}")]
    Serve(std::io::Error),
}

#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub addr: SocketAddr,
    pub cert: PathBuf,
    pub key: PathBuf,
}

pub struct WebhookState<I, S> {
    validator: ConflictValidator<I, S>,
    timeout: Duration,
}

impl<I: Inventory, S: SemanticValidator> WebhookState<I, S> {
    pub fn new(validator: ConflictValidator<I, S>, timeout: Duration) -> Self {
        Self { validator, timeout }
    }
}

pub fn router<I, S>(state: Arc<WebhookState<I, S>>) -> Router
where
    I: Inventory + 'static,
    S: SemanticValidator + 'static,
{
    Router::new()
        .route(VALIDATE_PATH, post(validate_handler::<I, S>))
        .route(HEALTHZ_PATH, get(|| async { "ok" }))
        .with_state(state)
}

pub async fn validate_handler<I, S>(
    State(state): State<Arc<WebhookState<I, S>>>,
    Json(body): Json<AdmissionReview<RoutingConfiguration>>,
) -> Json<AdmissionReview<DynamicObject>>
where
    I: Inventory,
    S: SemanticValidator,
{
    let req: AdmissionRequest<RoutingConfiguration> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!("Failed to parse admission request: {e}");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };
    Json(review(&state, &req).await.into_review())
}

async fn review<I, S>(
    state: &WebhookState<I, S>,
    req: &AdmissionRequest<RoutingConfiguration>,
) -> AdmissionResponse
where
    I: Inventory,
    S: SemanticValidator,
{
    let operation = match req.operation {
        AdmissionOperation::Create => Operation::Create,
        AdmissionOperation::Update => Operation::Update,
        AdmissionOperation::Delete => Operation::Delete,
        AdmissionOperation::Connect => return AdmissionResponse::from(req),
    };
    let object = match operation {
        Operation::Delete => req.old_object.as_ref(),
        Operation::Create | Operation::Update => req.object.as_ref(),
    };
    let Some(object) = object else {
        if operation == Operation::Delete {
            return AdmissionResponse::from(req);
        }
        warn!(uid = %req.uid, "Admission request carries no object");
        return AdmissionResponse::from(req).deny("Request carries no RoutingConfiguration");
    };

    let mut fragment = object.clone();
    if fragment.metadata.namespace.is_none() {
        fragment.metadata.namespace.clone_from(&req.namespace);
    }

    let outcome = tokio::time::timeout(
        state.timeout,
        state.validator.validate(&fragment, operation),
    )
    .await
    .unwrap_or(Err(ValidationError::Timeout(state.timeout)));

    match outcome {
        Ok(()) => {
            debug!(uid = %req.uid, "Allowing {operation:?} of {}", req.name);
            AdmissionResponse::from(req)
        }
        Err(e) => {
            info!(uid = %req.uid, "Denying {operation:?} of {}: {e}", req.name);
            AdmissionResponse::from(req).deny(e.to_string())
        }
    }
}

/// Serve the webhook over TLS until `cancel` fires.
pub async fn serve<I, S>(
    config: &WebhookConfig,
    state: Arc<WebhookState<I, S>>,
    cancel: CancellationToken,
) -> Result<(), WebhookError>
where
    I: Inventory + 'static,
    S: SemanticValidator + 'static,
{
    let tls = RustlsConfig::from_pem_file(&config.cert, &config.key)
        .await
        .map_err(WebhookError::Tls)?;

    let handle = Handle::new();
    let shutdown = handle.clone();
    tokio::spawn(async move {
        cancel.cancelled().await;
        shutdown.graceful_shutdown(Some(Duration::from_secs(5)));
    });

    info!("Starting admission webhook on {}", config.addr);
    axum_server::bind_rustls(config.addr, tls)
        .handle(handle)
        .serve(router(state).into_make_service())
        .await
        .map_err(WebhookError::Serve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::InventoryError;
    use crate::inventory::NodeInfo;
    use crate::semantic::RouterConfigValidator;
    use async_trait::async_trait;
    use k8s_intf::{BgpConfig, Router as BgpRouter, RoutingConfigurationSpec};
    use selector::SelectorCache;
    use serde_json::json;

    struct StaticInventory {
        fragments: Vec<RoutingConfiguration>,
        delay: Duration,
    }

    #[async_trait]
    impl Inventory for StaticInventory {
        async fn nodes(&self) -> Result<Vec<NodeInfo>, InventoryError> {
            tokio::time::sleep(self.delay).await;
            Ok(vec![NodeInfo::new("n1", &[("rack", "a")])])
        }
        async fn fragments(&self) -> Result<Vec<RoutingConfiguration>, InventoryError> {
            Ok(self.fragments.clone())
        }
    }

    fn fragment(name: &str, asn: u32) -> RoutingConfiguration {
        let mut rc = RoutingConfiguration::new(
            name,
            RoutingConfigurationSpec {
                node_selector: None,
                bgp: BgpConfig {
                    routers: vec![BgpRouter {
                        asn,
                        ..Default::default()
                    }],
                    bfd_profiles: vec![],
                },
            },
        );
        rc.metadata.namespace = Some("fabric".to_string());
        rc
    }

    fn state(delay: Duration) -> Arc<WebhookState<StaticInventory, RouterConfigValidator>> {
        let inventory = StaticInventory {
            fragments: vec![fragment("existing", 65000)],
            delay,
        };
        let validator = ConflictValidator::new(
            inventory,
            RouterConfigValidator,
            Arc::new(SelectorCache::default()),
        );
        Arc::new(WebhookState::new(validator, Duration::from_secs(1)))
    }

    fn admission_review(
        operation: &str,
        object: Option<&RoutingConfiguration>,
        old_object: Option<&RoutingConfiguration>,
    ) -> AdmissionReview<RoutingConfiguration> {
        let review = json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                "kind": {"group": "routefleet.io", "version": "v1beta1", "kind": "RoutingConfiguration"},
                "resource": {"group": "routefleet.io", "version": "v1beta1", "resource": "routingconfigurations"},
                "name": "new",
                "namespace": "fabric",
                "operation": operation,
                "userInfo": {"username": "admin"},
                "object": object,
                "oldObject": old_object,
                "dryRun": false,
            }
        });
        serde_json::from_value(review).unwrap()
    }

    async fn call(
        state: Arc<WebhookState<StaticInventory, RouterConfigValidator>>,
        review: AdmissionReview<RoutingConfiguration>,
    ) -> AdmissionResponse {
        let Json(reply) = validate_handler(State(state), Json(review)).await;
        reply.response.unwrap()
    }

    #[tokio::test]
    async fn test_create_allowed() {
        let new = fragment("new", 65000);
        let response = call(
            state(Duration::ZERO),
            admission_review("CREATE", Some(&new), None),
        )
        .await;
        assert!(response.allowed);
    }

    #[tokio::test]
    async fn test_create_denied_on_conflict() {
        let new = fragment("new", 65001);
        let response = call(
            state(Duration::ZERO),
            admission_review("CREATE", Some(&new), None),
        )
        .await;
        assert!(!response.allowed);
        let message = response.result.message;
        assert!(message.contains("n1"), "{message}");
        assert!(message.contains("ASN mismatch"), "{message}");
    }

    #[tokio::test]
    async fn test_delete_allowed() {
        let old = fragment("new", 65001);
        let response = call(
            state(Duration::ZERO),
            admission_review("DELETE", None, Some(&old)),
        )
        .await;
        assert!(response.allowed);
    }

    #[tokio::test]
    async fn test_namespace_taken_from_request() {
        let mut new = fragment("existing", 65001);
        new.metadata.namespace = None;
        // same identity as the listed fragment, so it is an update of itself
        let response = call(
            state(Duration::ZERO),
            admission_review("UPDATE", Some(&new), None),
        )
        .await;
        assert!(response.allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_denies() {
        let new = fragment("new", 65000);
        let response = call(
            state(Duration::from_secs(30)),
            admission_review("CREATE", Some(&new), None),
        )
        .await;
        assert!(!response.allowed);
        assert!(response.result.message.contains("did not complete"));
    }

    #[tokio::test]
    async fn test_malformed_review_is_invalid() {
        let review: AdmissionReview<RoutingConfiguration> = serde_json::from_value(json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
        }))
        .unwrap();
        let Json(reply) = validate_handler(State(state(Duration::ZERO)), Json(review)).await;
        let response = reply.response.unwrap();
        assert!(!response.allowed);
    }
}
