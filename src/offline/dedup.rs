//! # Request Deduplication Cache
//!
//! Short-lived, in-memory guard against re-issuing an action that is
//! already in flight. Because the executor awaits its remote call, a second
//! invocation of the same logical action can pass its precondition check
//! while the first is suspended; the cache closes that window.
//!
//! Keys are built deterministically from the operation kind and its target
//! entity ids, e.g. `"deploy_officer-{patrol_id}-{officer_id}"`. An action
//! records its key when it starts and clears it on success and on terminal
//! failure. On enqueue-for-later the key is cleared too, since the queue
//! owns de-duplication from then on via its own `request_id`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// In-flight request guard
#[derive(Debug, Default)]
pub struct DedupCache {
    requests: RwLock<HashMap<String, Instant>>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this key is already in flight
    pub async fn is_duplicate(&self, key: &str) -> bool {
        self.requests.read().await.contains_key(key)
    }

    /// Record a request as in flight
    pub async fn record(&self, key: &str) {
        self.requests
            .write()
            .await
            .insert(key.to_string(), Instant::now());
    }

    /// Clear a finished request (success or terminal failure)
    pub async fn clear(&self, key: &str) {
        self.requests.write().await.remove(key);
    }

    /// Number of requests currently in flight
    pub async fn len(&self) -> usize {
        self.requests.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.requests.read().await.is_empty()
    }

    /// Drop entries older than `max_age`. Guards against keys leaked by a
    /// caller that never reached its clear call.
    pub async fn sweep_stale(&self, max_age: Duration) -> usize {
        let mut requests = self.requests.write().await;
        let before = requests.len();
        requests.retain(|_, started| started.elapsed() < max_age);
        before - requests.len()
    }
}
