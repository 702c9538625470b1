use axum::{
    routing::{get, post},
    Router,
};
use std::sync::{
    atomic::{AtomicI64, AtomicU64, Ordering},
    Arc,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::relay::broadcast::Broadcaster;
use crate::relay::registry::ConnectionRegistry;
use danmu_core::config::RelayConfig;

/// Process-lifetime counters, read by /api/status. Atomics only.
#[derive(Default)]
pub struct RelayStats {
    danmu_count: AtomicU64,
    /// Epoch ms of the last accepted danmu; 0 = none yet.
    last_danmu_ms: AtomicI64,
}

impl RelayStats {
    pub fn record_danmu(&self) {
        self.danmu_count.fetch_add(1, Ordering::Relaxed);
        self.last_danmu_ms
            .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn danmu_count(&self) -> u64 {
        self.danmu_count.load(Ordering::Relaxed)
    }

    pub fn last_danmu_ms(&self) -> Option<i64> {
        match self.last_danmu_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(ms),
        }
    }
}

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: RelayConfig,
    pub registry: Arc<ConnectionRegistry>,
    pub broadcaster: Broadcaster,
    pub stats: RelayStats,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            config,
            broadcaster: Broadcaster::new(registry.clone()),
            registry,
            stats: RelayStats::default(),
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/api/sse", get(crate::relay::stream::sse_handler))
        .route("/api/send-danmu", post(crate::http::submit::submit_handler))
        .route("/api/status", get(crate::http::status::status_handler));

    // overlay HTML client, when a static dir is configured
    if let Some(ref dir) = state.config.gateway.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
