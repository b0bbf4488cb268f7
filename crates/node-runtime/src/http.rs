//! The node's HTTP surface.
//!
//! The inbox route comes from the inbox crate; this module adds the
//! `.well-known` discovery documents and the maintenance-mode layer that
//! turns every route into a 503 while the flag is set.

use crate::config::NodeConfig;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag flipping the node into maintenance mode.
#[derive(Clone, Default)]
pub struct MaintenanceFlag {
    enabled: Arc<AtomicBool>,
}

impl MaintenanceFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable maintenance mode.
    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Current state.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

async fn maintenance_gate(
    State(flag): State<MaintenanceFlag>,
    request: axum::extract::Request,
    next: Next,
) -> Response {
    if flag.is_enabled() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    next.run(request).await
}

#[derive(Clone)]
struct DiscoveryState {
    config: Arc<NodeConfig>,
    public_key_b64: String,
}

async fn did_orb(State(state): State<DiscoveryState>) -> Json<Value> {
    let origin = state
        .config
        .service_iri
        .origin()
        .unwrap_or("https://orb-mesh.local")
        .to_string();
    Json(json!({
        "resolutionEndpoint": format!("{origin}/sidetree/v1/identifiers"),
        "operationEndpoint": format!("{origin}/sidetree/v1/operations"),
    }))
}

async fn webfinger(
    State(state): State<DiscoveryState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(resource) = params.get("resource") else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let service = state.config.service_iri.as_str();
    Json(json!({
        "subject": resource,
        "properties": {
            "https://trustbloc.dev/ns/min-resolvers": state.config.min_resolvers,
            "https://trustbloc.dev/ns/public-key": state.public_key_b64,
        },
        "links": [
            {"rel": "self", "type": "application/activity+json", "href": service},
        ],
    }))
    .into_response()
}

async fn host_meta(State(state): State<DiscoveryState>) -> Json<Value> {
    let origin = state
        .config
        .service_iri
        .origin()
        .unwrap_or("https://orb-mesh.local")
        .to_string();
    Json(json!({
        "links": [{
            "rel": "lrdd",
            "type": "application/jrd+json",
            "template": format!("{origin}/.well-known/webfinger?resource={{uri}}"),
        }],
    }))
}

/// The discovery routes plus the maintenance layer over `routes`.
pub fn node_router(
    config: Arc<NodeConfig>,
    public_key_b64: String,
    maintenance: MaintenanceFlag,
    inbox: Router,
) -> Router {
    let discovery = DiscoveryState {
        config,
        public_key_b64,
    };
    Router::new()
        .route("/.well-known/did-orb", get(did_orb))
        .route("/.well-known/webfinger", get(webfinger))
        .route("/.well-known/host-meta.json", get(host_meta))
        .with_state(discovery)
        .merge(inbox)
        .layer(middleware::from_fn_with_state(maintenance, maintenance_gate))
}
