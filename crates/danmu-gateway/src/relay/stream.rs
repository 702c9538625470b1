//! GET /api/sse — the long-lived viewer stream.
//!
//! Registration, the connect ack, and the liveness timers all happen here;
//! after that the handler is just a pump from the connection's frame queue
//! into the SSE body. Cleanup is a drop guard, so the client vanishing
//! mid-stream takes the same path as an orderly close.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use crate::app::AppState;
use crate::relay::liveness;
use crate::relay::registry::ConnectionRegistry;
use danmu_core::config::CONNECTION_QUEUE_FRAMES;
use danmu_protocol::frames::ConnectedFrame;

/// Unregisters the connection when the SSE body is dropped — the transport
/// close notification for this server.
struct StreamGuard {
    id: String,
    registry: Arc<ConnectionRegistry>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if self.registry.unregister(&self.id) {
            info!(conn_id = %self.id, connections = self.registry.count(), "sse connection closed");
        }
    }
}

pub async fn sse_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, mut rx) = mpsc::channel::<String>(CONNECTION_QUEUE_FRAMES);
    let (id, handle) = state.registry.register(tx);
    info!(conn_id = %id, connections = state.registry.count(), "sse connection open");

    // connect ack goes into the queue first, before any timer can fire
    let ack = serde_json::to_string(&ConnectedFrame::new(id.clone())).unwrap_or_default();
    let _ = handle.push(ack);

    liveness::spawn_heartbeat(
        state.registry.clone(),
        id.clone(),
        handle.clone(),
        Duration::from_secs(state.config.relay.heartbeat_interval_secs),
    );
    if state.config.relay.development {
        liveness::spawn_demo_feed(
            state.registry.clone(),
            id.clone(),
            handle,
            Duration::from_secs(state.config.relay.demo_interval_secs),
        );
    }

    let guard = StreamGuard {
        id,
        registry: state.registry.clone(),
    };
    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(frame) = rx.recv().await {
            yield Ok::<_, Infallible>(Event::default().data(frame));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
