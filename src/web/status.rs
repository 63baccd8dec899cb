//! Health and status handlers.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::trace;
use ts_rs::TS;

use crate::state::AppState;

#[derive(Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Integrations {
    weather: bool,
    photos: bool,
}

#[derive(Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StatusResponse {
    version: String,
    commit: String,
    uptime_secs: u64,
    cache_entries: usize,
    active_sessions: usize,
    loaded_saved_sets: usize,
    integrations: Integrations,
}

/// Health check endpoint
pub(super) async fn health() -> Json<Value> {
    trace!("health check requested");
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Build and runtime information
pub(super) async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: env!("GIT_COMMIT_HASH").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        cache_entries: state.cache.len(),
        active_sessions: state.sessions.len(),
        loaded_saved_sets: state.saved.loaded_users(),
        integrations: Integrations {
            weather: state.weather.is_configured(),
            photos: state.photos.is_configured(),
        },
    })
}
