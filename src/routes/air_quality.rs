//! Station read endpoints under `/api/air-quality`.
//!
//! Everything here is a thin pass-through to [`StationStore`] reads or the
//! live query service; nothing writes.
//!
//! [`StationStore`]: crate::store::StationStore

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info};

use super::AppState;
use crate::store::StoreError;

/// Index above which a station counts as "above threshold" unless overridden.
const DEFAULT_STATS_THRESHOLD: i32 = 200;

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/air-quality", get(list_stations))
        .route("/api/air-quality/live", get(live_conditions))
        .route("/api/air-quality/stats", get(station_stats))
        .route("/api/air-quality/zone/{zone}", get(stations_by_zone))
        .route("/api/air-quality/{id}", get(station_by_id))
}

#[derive(Debug, Deserialize)]
struct StatsQuery {
    threshold: Option<i32>,
}

// ---

async fn live_conditions(State(state): State<AppState>) -> Response {
    // ---
    let response = state.live.current_conditions().await;
    info!(
        "GET /api/air-quality/live - {} readings ({:?})",
        response.data.len(),
        response.source
    );
    Json(response).into_response()
}

async fn list_stations(State(state): State<AppState>) -> Response {
    // ---
    match state.store.list().await {
        Ok(records) => {
            debug!("GET /api/air-quality - {} records", records.len());
            Json(records).into_response()
        }
        Err(e) => server_error("list stations", e),
    }
}

async fn station_by_id(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    // ---
    match state.store.get(&id).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Sensor not found" })),
        )
            .into_response(),
        Err(e) => server_error("get station", e),
    }
}

async fn stations_by_zone(State(state): State<AppState>, Path(zone): Path<String>) -> Response {
    // ---
    match state.store.list_by_zone(&zone).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => server_error("list stations by zone", e),
    }
}

async fn station_stats(
    State(state): State<AppState>,
    Query(params): Query<StatsQuery>,
) -> Response {
    // ---
    let threshold = params.threshold.unwrap_or(DEFAULT_STATS_THRESHOLD);
    match state.store.stats(threshold).await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => server_error("compute stats", e),
    }
}

fn server_error(action: &str, e: StoreError) -> Response {
    // ---
    error!("Failed to {}: {}", action, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "Server error" })),
    )
        .into_response()
}
