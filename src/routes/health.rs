// src/routes/health.rs
//! Liveness endpoint.
//!
//! Used by container orchestrators and CI to check that the service answers
//! HTTP. Also reports whether the live read path is backed by a real upstream
//! or serving simulated data. Does not touch the store or any upstream.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    live_mode: &'static str,
}

/// Handle `GET /health`.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    // ---
    let live_mode = if state.live.is_live() {
        "live"
    } else {
        "simulated"
    };

    Json(HealthResponse {
        status: "ok",
        live_mode,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
