use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use danmu_core::config::RelayConfig;
use danmu_gateway::{app, relay};

/// SSE danmu relay: fans overlay comments out to connected viewers.
#[derive(Debug, Parser)]
#[command(name = "danmu-gateway", version)]
struct Cli {
    /// Listen port (overrides config).
    #[arg(long)]
    port: Option<u16>,
    /// Bind address (overrides config).
    #[arg(long)]
    bind: Option<String>,
    /// Development mode: feed each viewer synthetic danmu.
    #[arg(long)]
    dev: bool,
    /// Path to danmu.toml.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "danmu_gateway=info,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > DANMU_CONFIG env > ~/.danmu/danmu.toml
    let config_path = cli.config.or_else(|| std::env::var("DANMU_CONFIG").ok());
    let mut config = RelayConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        RelayConfig::default()
    });

    // CLI flags win over file and env
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    if let Some(bind) = cli.bind {
        config.gateway.bind = bind;
    }
    if cli.dev {
        config.relay.development = true;
    }

    let state = Arc::new(app::AppState::new(config));
    let router = app::build_router(state.clone());

    if let Some(ttl) = state.config.relay.idle_timeout_secs {
        relay::liveness::spawn_idle_sweeper(state.registry.clone(), Duration::from_secs(ttl));
        info!(ttl_secs = ttl, "idle eviction enabled");
    }

    let addr: SocketAddr =
        format!("{}:{}", state.config.gateway.bind, state.config.gateway.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // the desktop shell watches for this line to detect readiness
    info!("danmu gateway listening on {}", addr);
    info!("SSE endpoint: http://{}/api/sse", addr);
    info!(development = state.config.relay.development, "relay ready");

    axum::serve(listener, router).await?;
    Ok(())
}
