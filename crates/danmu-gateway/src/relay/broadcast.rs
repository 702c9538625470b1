use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};

use crate::relay::registry::ConnectionRegistry;

/// Counts for one fan-out pass. Diagnostics only; delivery is best-effort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub pruned: usize,
}

/// Fans one message out to every registered connection.
///
/// A dead or stalled peer is unregistered and the pass continues — one bad
/// viewer never blocks delivery to the rest, and nothing is retried.
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn broadcast(&self, message: &Value) -> DeliveryReport {
        // serialize once, clone the string per peer
        let frame = message.to_string();
        let mut report = DeliveryReport::default();

        for (id, handle) in self.registry.snapshot() {
            match handle.push(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Closed(_)) => {
                    debug!(conn_id = %id, "peer gone, pruning");
                    self.registry.unregister(&id);
                    report.pruned += 1;
                }
                Err(TrySendError::Full(_)) => {
                    info!(conn_id = %id, "peer stalled past its frame budget, pruning");
                    self.registry.unregister(&id);
                    report.pruned += 1;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use danmu_core::config::CONNECTION_QUEUE_FRAMES;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn harness() -> (Arc<ConnectionRegistry>, Broadcaster) {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Broadcaster::new(registry.clone());
        (registry, broadcaster)
    }

    #[tokio::test]
    async fn delivers_to_every_live_connection() {
        let (registry, broadcaster) = harness();
        let (tx_a, mut rx_a) = mpsc::channel(CONNECTION_QUEUE_FRAMES);
        let (tx_b, mut rx_b) = mpsc::channel(CONNECTION_QUEUE_FRAMES);
        registry.register(tx_a);
        registry.register(tx_b);

        let report = broadcaster.broadcast(&json!({"type":"danmu","text":"hello"}));

        assert_eq!(report, DeliveryReport { delivered: 2, pruned: 0 });
        for rx in [&mut rx_a, &mut rx_b] {
            let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
            assert_eq!(frame["type"], "danmu");
            assert_eq!(frame["text"], "hello");
        }
    }

    #[tokio::test]
    async fn prunes_dead_peer_without_blocking_the_rest() {
        let (registry, broadcaster) = harness();
        let (tx_dead, rx_dead) = mpsc::channel(CONNECTION_QUEUE_FRAMES);
        let (tx_live, mut rx_live) = mpsc::channel(CONNECTION_QUEUE_FRAMES);
        registry.register(tx_dead);
        registry.register(tx_live);
        drop(rx_dead);

        let report = broadcaster.broadcast(&json!({"type":"danmu","text":"still here"}));

        assert_eq!(report.delivered, 1);
        assert_eq!(report.pruned, 1);
        assert_eq!(registry.count(), 1);
        assert!(rx_live.recv().await.unwrap().contains("still here"));
    }

    #[tokio::test]
    async fn prunes_stalled_peer_with_full_queue() {
        let (registry, broadcaster) = harness();
        let (tx, _rx) = mpsc::channel(1);
        let (_, handle) = registry.register(tx);
        handle.push("filler".into()).unwrap();

        let report = broadcaster.broadcast(&json!({"type":"danmu","text":"overflow"}));

        assert_eq!(report.delivered, 0);
        assert_eq!(report.pruned, 1);
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test]
    async fn frames_for_one_connection_keep_send_order() {
        let (registry, broadcaster) = harness();
        let (tx, mut rx) = mpsc::channel(CONNECTION_QUEUE_FRAMES);
        let (_, handle) = registry.register(tx);

        handle
            .push(r#"{"type":"heartbeat","timestamp":1}"#.into())
            .unwrap();
        broadcaster.broadcast(&json!({"type":"danmu","text":"after"}));

        assert!(rx.recv().await.unwrap().contains("heartbeat"));
        assert!(rx.recv().await.unwrap().contains("after"));
    }
}
