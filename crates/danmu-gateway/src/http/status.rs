use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /api/status — live connection count plus relay counters.
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "connections": state.registry.count(),
        "timestamp": chrono::Utc::now().timestamp_millis(),
        "development": state.config.relay.development,
        "danmu_count": state.stats.danmu_count(),
        "last_danmu": state.stats.last_danmu_ms(),
    }))
}
