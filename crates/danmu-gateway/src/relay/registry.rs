use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// One open SSE stream to a viewer.
///
/// The bounded queue sender is the only write path into the stream, so all
/// frames for a single viewer leave in the order they were pushed. The
/// cancellation token fans out to the per-connection timer tasks.
pub struct ConnectionHandle {
    queue: mpsc::Sender<String>,
    cancel: CancellationToken,
    /// Epoch ms of the last successful push. Diagnostics and (optional)
    /// idle eviction only.
    last_activity_ms: AtomicI64,
}

impl ConnectionHandle {
    fn new(queue: mpsc::Sender<String>) -> Self {
        Self {
            queue,
            cancel: CancellationToken::new(),
            last_activity_ms: AtomicI64::new(chrono::Utc::now().timestamp_millis()),
        }
    }

    /// Queue a serialized frame without waiting. `Full` means the peer has
    /// stalled past its frame budget, `Closed` means it is gone; either way
    /// the caller is expected to unregister the connection.
    pub fn push(&self, frame: String) -> Result<(), TrySendError<String>> {
        self.queue.try_send(frame)?;
        self.last_activity_ms
            .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
        Ok(())
    }

    /// True once the viewer side of the stream is gone.
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn idle_for(&self, now_ms: i64) -> Duration {
        let idle = now_ms.saturating_sub(self.last_activity_ms.load(Ordering::Relaxed));
        Duration::from_millis(idle.max(0) as u64)
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, by: Duration) {
        self.last_activity_ms
            .fetch_sub(by.as_millis() as i64, Ordering::Relaxed);
    }
}

/// Process-wide map of live connections. The map itself is never exposed;
/// all mutation goes through register/unregister so the cancellation
/// lifecycle stays tied to membership.
pub struct ConnectionRegistry {
    connections: DashMap<String, Arc<ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Add a connection and hand back its fresh id. Ids are uuid-v4, so no
    /// two live connections ever collide.
    pub fn register(&self, queue: mpsc::Sender<String>) -> (String, Arc<ConnectionHandle>) {
        let id = uuid::Uuid::new_v4().to_string();
        let handle = Arc::new(ConnectionHandle::new(queue));
        self.connections.insert(id.clone(), handle.clone());
        (id, handle)
    }

    /// Remove a connection and cancel its timer tasks. Idempotent: close,
    /// error, and failed-write paths race here and only the first one acts.
    /// Returns whether this call did the removal.
    pub fn unregister(&self, id: &str) -> bool {
        match self.connections.remove(id) {
            Some((_, handle)) => {
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Point-in-time copy of the live set. Mutations after the call do not
    /// affect a snapshot already taken.
    pub fn snapshot(&self) -> Vec<(String, Arc<ConnectionHandle>)> {
        self.connections
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Drop connections with no successful write for longer than `ttl`.
    /// Only called when the idle-eviction policy is enabled.
    pub fn evict_idle(&self, ttl: Duration) -> Vec<String> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let stale: Vec<String> = self
            .connections
            .iter()
            .filter(|entry| entry.value().idle_for(now_ms) > ttl)
            .map(|entry| entry.key().clone())
            .collect();
        for id in &stale {
            if self.unregister(id) {
                info!(conn_id = %id, "evicted idle connection");
            }
        }
        stale
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
        mpsc::channel(8)
    }

    #[test]
    fn register_assigns_unique_ids() {
        let registry = ConnectionRegistry::new();
        let (tx_a, _rx_a) = queue();
        let (tx_b, _rx_b) = queue();

        let (id_a, _) = registry.register(tx_a);
        let (id_b, _) = registry.register(tx_b);

        assert_ne!(id_a, id_b);
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = queue();
        let (id, handle) = registry.register(tx);

        assert!(registry.unregister(&id));
        assert!(handle.cancel_token().is_cancelled());
        // second removal and unknown ids are no-ops
        assert!(!registry.unregister(&id));
        assert!(!registry.unregister("no-such-id"));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn snapshot_is_point_in_time() {
        let registry = ConnectionRegistry::new();
        let (tx_a, _rx_a) = queue();
        let (id_a, _) = registry.register(tx_a);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);

        let (tx_b, _rx_b) = queue();
        registry.register(tx_b);
        registry.unregister(&id_a);

        // the earlier snapshot is unaffected by later mutations
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, id_a);
    }

    #[test]
    fn push_reports_closed_peer() {
        let registry = ConnectionRegistry::new();
        let (tx, rx) = queue();
        let (_, handle) = registry.register(tx);

        drop(rx);
        assert!(matches!(
            handle.push("{}".into()),
            Err(TrySendError::Closed(_))
        ));
        assert!(handle.is_closed());
    }

    #[test]
    fn evict_idle_only_removes_stale_connections() {
        let registry = ConnectionRegistry::new();
        let (tx_a, _rx_a) = queue();
        let (tx_b, _rx_b) = queue();
        let (id_stale, stale) = registry.register(tx_a);
        let (id_fresh, _) = registry.register(tx_b);

        stale.backdate(Duration::from_secs(600));
        let evicted = registry.evict_idle(Duration::from_secs(300));

        assert_eq!(evicted, vec![id_stale]);
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.snapshot()[0].0, id_fresh);
    }
}
