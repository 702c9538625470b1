use serde::{Deserialize, Serialize};

/// Server → Client connect acknowledgment, pushed once right after the
/// stream opens and before any other frame.
/// Wire: `{ "type": "connected", "id": "550e8400-..." }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub id: String,
}

impl ConnectedFrame {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            frame_type: "connected".to_string(),
            id: id.into(),
        }
    }
}

/// Server → Client keepalive, distinguishable from danmu by its `type` tag.
/// Wire: `{ "type": "heartbeat", "timestamp": 1756400000000 }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl HeartbeatFrame {
    pub fn now() -> Self {
        Self {
            frame_type: "heartbeat".to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}
