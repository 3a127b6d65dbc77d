//! Router configuration and the two endpoint handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use waypost_core::{Envelope, RequestId};

use crate::pipeline;
use crate::state::GatewayState;

/// Create the gateway router.
///
/// One endpoint carries everything:
///
/// - `GET /` — health probe, no credentials required
/// - `POST /` — the full command pipeline
pub fn create_router(state: Arc<GatewayState>) -> Router {
    let max_body_bytes = state.settings.max_body_bytes;

    Router::new()
        .route("/", get(health).post(command))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

/// Health probe. Reveals whether the service is configured, never any
/// secret-bearing config.
async fn health(State(state): State<Arc<GatewayState>>) -> Json<Envelope> {
    let request_id = RequestId::generate();
    let data = json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        "version": env!("CARGO_PKG_VERSION"),
        "configured": state.config.jwt_secret().is_some(),
    });
    Json(Envelope::success(data, &request_id))
}

/// The command endpoint. The response is always HTTP 200 with an envelope;
/// the body, not the status line, is the contract.
async fn command(State(state): State<Arc<GatewayState>>, body: Bytes) -> Json<Envelope> {
    Json(pipeline::handle_command(&state, &body).await)
}
