use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

// Wire defaults — must match what the overlay client expects
pub const DEFAULT_PORT: u16 = 8180;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30; // keepalive frame cadence
pub const DEMO_INTERVAL_SECS: u64 = 3; // synthetic danmu cadence (dev mode)
pub const CONNECTION_QUEUE_FRAMES: usize = 64; // per-viewer frame budget before we drop the peer

// Message field defaults applied when the submitter omits them
pub const DEFAULT_USER: &str = "anonymous";
pub const DEFAULT_COLOR: &str = "#ffffff";
pub const DEFAULT_SIZE: u32 = 24;

/// Top-level config (danmu.toml + DANMU_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelayConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub relay: RelayPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory served as a fallback for the overlay HTML client.
    /// When unset, only the API routes exist.
    pub static_dir: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            static_dir: None,
        }
    }
}

/// Broadcast-side policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayPolicy {
    /// Development mode: each viewer also gets a synthetic danmu feed.
    #[serde(default)]
    pub development: bool,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_demo_interval")]
    pub demo_interval_secs: u64,
    /// Evict viewers with no successful write for this long. Off by default;
    /// explicit close and failed writes already cover the normal paths.
    pub idle_timeout_secs: Option<u64>,
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self {
            development: false,
            heartbeat_interval_secs: HEARTBEAT_INTERVAL_SECS,
            demo_interval_secs: DEMO_INTERVAL_SECS,
            idle_timeout_secs: None,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_heartbeat_interval() -> u64 {
    HEARTBEAT_INTERVAL_SECS
}
fn default_demo_interval() -> u64 {
    DEMO_INTERVAL_SECS
}

impl RelayConfig {
    /// Load config from a TOML file with DANMU_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.danmu/danmu.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: RelayConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("DANMU_").split("_"))
            .extract()
            .map_err(|e| crate::error::RelayError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.danmu/danmu.toml", home)
}
