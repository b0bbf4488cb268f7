//! The HTTP ingest handler.

use crate::config::InboxConfig;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::post;
use axum::Router;
use mesh_telemetry::metrics;
use shared_bus::{message::properties, Message, MessageBus};
use shared_crypto::HttpSignatureVerifier;
use shared_types::StateHandle;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// State shared by the ingest route.
#[derive(Clone)]
pub struct HttpState {
    pub config: Arc<InboxConfig>,
    pub bus: Arc<dyn MessageBus>,
    /// Verifier for HTTP signatures; absent only when bearer tokens are the
    /// sole accepted authentication.
    pub verifier: Option<Arc<HttpSignatureVerifier>>,
    /// Router lifecycle; requests are refused until it reports running.
    pub router_state: StateHandle,
}

/// The inbox route at `path`.
pub fn inbox_routes(path: &str, state: HttpState) -> Router {
    Router::new().route(path, post(post_inbox)).with_state(state)
}

async fn post_inbox(
    State(state): State<HttpState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if !state.router_state.is_running() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    let mut message = Message::new(body.to_vec());

    if bearer_token_accepted(&state.config, &headers) {
        debug!("Request authorized by bearer token");
    } else {
        let Some(verifier) = state.verifier.as_ref() else {
            warn!("No signature verifier configured and token check failed");
            return StatusCode::UNAUTHORIZED;
        };
        let header_map = lowercase_headers(&headers);
        match verifier
            .verify_request("POST", uri.path(), &header_map)
            .await
        {
            Ok(actor) => {
                message.set_property(properties::ACTOR_IRI, actor.to_string());
            }
            Err(e) => {
                warn!(error = %e, "HTTP signature verification failed");
                return StatusCode::UNAUTHORIZED;
            }
        }
    }

    match state
        .bus
        .publish(&state.config.topic, vec![message])
        .await
    {
        Ok(()) => {
            metrics::INBOX_ACCEPTED.inc();
            StatusCode::OK
        }
        Err(e) => {
            warn!(error = %e, "Failed to enqueue inbound activity");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn bearer_token_accepted(config: &InboxConfig, headers: &HeaderMap) -> bool {
    if config.auth_tokens.is_empty() {
        return false;
    }
    let Some(value) = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let Some(token) = value.strip_prefix("Bearer ") else {
        return false;
    };
    config.auth_tokens.iter().any(|t| t == token)
}

fn lowercase_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect()
}
