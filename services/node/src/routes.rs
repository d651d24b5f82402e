//! Sync node routes

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use common::Adapter;
use serde_json::{Value, json};
use tracing::warn;
use watcher::{Watcher, WatcherState};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub adapter: Arc<dyn Adapter>,
    pub watcher: Option<Arc<Watcher>>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let store_up = match state.adapter.ping().await {
        Ok(up) => up,
        Err(err) => {
            warn!("Store health check failed: {}", err);
            false
        }
    };

    let watcher = match &state.watcher {
        Some(watcher) => match watcher.state().await {
            WatcherState::Disconnected => "disconnected",
            WatcherState::Connecting => "connecting",
            WatcherState::Subscribed => "subscribed",
            WatcherState::Closed => "closed",
        },
        None => "disabled",
    };

    let store = if store_up { "up" } else { "down" };
    // A node no longer receiving peer updates serves stale state
    let (code, status) = if store_up && watcher != "disconnected" {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(json!({
            "status": status,
            "service": "token-sync-node",
            "store": store,
            "watcher": watcher,
        })),
    )
}
