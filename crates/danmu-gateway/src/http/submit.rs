//! Danmu ingress — POST /api/send-danmu
//!
//! Request:  `{"text": "hello", "user": "alice", ...}` (only `text` required)
//! Response: `{"success": true, "message": "danmu accepted"}`
//! Error:    400 `{"success": false, "error": "...", "code": "MISSING_TEXT"}`
//!
//! The ack confirms hand-off to the broadcaster, not that any viewer
//! received the frame.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::app::AppState;
use danmu_protocol::message::DanmuSubmission;

pub async fn submit_handler(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<DanmuSubmission>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let message = submission.normalize().map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": e.to_string(),
                "code": e.code(),
            })),
        )
    })?;

    let report = state.broadcaster.broadcast(&message);
    state.stats.record_danmu();
    debug!(
        delivered = report.delivered,
        pruned = report.pruned,
        "danmu fanned out"
    );

    Ok(Json(json!({
        "success": true,
        "message": "danmu accepted",
    })))
}
