//! HTTP gateway: merges every subrouter and attaches the shared state.

use std::sync::Arc;

use axum::Router;

use crate::live::LiveQueryService;
use crate::store::StationStore;

mod air_quality;
mod health;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    // ---
    pub store: Arc<dyn StationStore>,
    pub live: Arc<LiveQueryService>,
}

impl AppState {
    pub fn new(store: Arc<dyn StationStore>, live: Arc<LiveQueryService>) -> Self {
        Self { store, live }
    }
}

// ---

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(air_quality::router())
        .merge(health::router())
        .with_state(state)
}
