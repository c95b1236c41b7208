pub mod dev_blob;
pub mod files;

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::server::AppState;

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "uptimeSeconds": state.metrics.uptime_seconds(),
        "activeRooms": state.signaling_hub.active_room_count(),
    }))
}

pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!(state.metrics.snapshot()))
}
