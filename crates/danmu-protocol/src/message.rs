//! Danmu submission body and its normalization into the broadcast frame.
//!
//! Request:  `{"text": "hello", "user": "alice", "color": "#ff0000", ...}`
//! Broadcast: `{"type":"danmu","text":"hello","user":"alice","color":"#ff0000",
//!             "size":24,"time":<epoch-ms>,"timestamp":"HH:MM:SS", ...extras}`

use danmu_core::config::{DEFAULT_COLOR, DEFAULT_SIZE, DEFAULT_USER};
use danmu_core::error::{RelayError, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Inbound POST body. Only `text` is required; unknown keys are kept and
/// passed through to viewers unchanged (the overlay client grows display
/// attributes faster than this server does).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DanmuSubmission {
    pub text: Option<String>,
    pub user: Option<String>,
    pub color: Option<String>,
    pub size: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DanmuSubmission {
    /// Build the broadcast frame. Layering order: defaults, then
    /// caller-supplied fields (extras included), then server-stamped fields
    /// last and unconditionally — a caller cannot forge `type`, `time`, or
    /// `timestamp`, nor smuggle them in through `extra`.
    pub fn normalize(self) -> Result<Value> {
        let text = match self.text {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Err(RelayError::MissingText),
        };

        let mut frame = Map::new();
        frame.insert("user".into(), json!(DEFAULT_USER));
        frame.insert("color".into(), json!(DEFAULT_COLOR));
        frame.insert("size".into(), json!(DEFAULT_SIZE));

        if let Some(user) = self.user {
            frame.insert("user".into(), json!(user));
        }
        if let Some(color) = self.color {
            frame.insert("color".into(), json!(color));
        }
        if let Some(size) = self.size {
            frame.insert("size".into(), json!(size));
        }
        for (key, value) in self.extra {
            frame.insert(key, value);
        }

        frame.insert("type".into(), json!("danmu"));
        frame.insert("text".into(), json!(text));
        frame.insert("time".into(), json!(chrono::Utc::now().timestamp_millis()));
        frame.insert(
            "timestamp".into(),
            json!(chrono::Local::now().format("%H:%M:%S").to_string()),
        );

        Ok(Value::Object(frame))
    }
}
