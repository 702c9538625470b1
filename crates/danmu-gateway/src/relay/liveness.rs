//! Per-connection timer tasks: keepalive heartbeats, the dev-mode synthetic
//! danmu feed, and the optional idle sweeper.
//!
//! Every task selects on the connection's cancellation token, which fires
//! the moment the connection is unregistered via any path — no timer ever
//! outlives its connection.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::relay::registry::{ConnectionHandle, ConnectionRegistry};
use danmu_core::config::DEFAULT_SIZE;
use danmu_protocol::frames::HeartbeatFrame;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

const DEMO_COLORS: [&str; 5] = ["#ff6b6b", "#4ecdc4", "#45b7d1", "#96ceb4", "#feca57"];

/// Keepalive loop for one connection. A closed transport or a failed push
/// unregisters the connection and ends the task.
pub fn spawn_heartbeat(
    registry: Arc<ConnectionRegistry>,
    id: String,
    handle: Arc<ConnectionHandle>,
    interval: Duration,
) {
    tokio::spawn(async move {
        let cancel = handle.cancel_token().clone();
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick fires immediately; the first heartbeat should land
        // one interval after the connect ack
        tick.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    if handle.is_closed() {
                        registry.unregister(&id);
                        break;
                    }
                    let payload = serde_json::to_string(&HeartbeatFrame::now())
                        .unwrap_or_default();
                    if handle.push(payload).is_err() {
                        registry.unregister(&id);
                        break;
                    }
                }
            }
        }
        debug!(conn_id = %id, "heartbeat task ended");
    });
}

/// Dev-mode feed: fabricates a danmu for this connection at a fixed cadence
/// so the overlay can be exercised without a real producer. Never spawned
/// outside `relay.development`.
pub fn spawn_demo_feed(
    registry: Arc<ConnectionRegistry>,
    id: String,
    handle: Arc<ConnectionHandle>,
    interval: Duration,
) {
    tokio::spawn(async move {
        let cancel = handle.cancel_token().clone();
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tick.tick().await;

        let mut seq: u64 = 0;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    seq += 1;
                    if handle.push(demo_danmu(seq).to_string()).is_err() {
                        registry.unregister(&id);
                        break;
                    }
                }
            }
        }
        debug!(conn_id = %id, "demo feed ended");
    });
}

/// A synthetic danmu carrying the full frame invariant, same as a real one.
fn demo_danmu(seq: u64) -> Value {
    json!({
        "type": "danmu",
        "text": format!("demo danmu {seq}"),
        "user": "demo",
        "color": DEMO_COLORS[(seq as usize) % DEMO_COLORS.len()],
        "size": DEFAULT_SIZE + (seq % 3) as u32 * 8,
        "time": chrono::Utc::now().timestamp_millis(),
        "timestamp": chrono::Local::now().format("%H:%M:%S").to_string(),
    })
}

/// Background eviction of connections with no successful write for `ttl`.
/// Only spawned when `relay.idle_timeout_secs` is set.
pub fn spawn_idle_sweeper(registry: Arc<ConnectionRegistry>, ttl: Duration) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SWEEP_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            let evicted = registry.evict_idle(ttl);
            if !evicted.is_empty() {
                info!(count = evicted.len(), "idle sweep evicted connections");
            }
        }
    });
}
