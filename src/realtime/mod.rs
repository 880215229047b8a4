//! Realtime delivery side-channel.
//!
//! Pushes notification payloads to connected sessions over per-user
//! broadcast channels. This is delivery only: the notification rows in the
//! database are the authoritative state, and payloads for absent or lagging
//! subscribers are dropped without error.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::debug;

const CHANNEL_CAPACITY: usize = 64;

/// Per-user fanout of JSON payloads.
#[derive(Debug, Clone, Default)]
pub struct RealtimeGateway {
    channels: Arc<RwLock<HashMap<i64, broadcast::Sender<String>>>>,
}

impl RealtimeGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a user's payload stream, creating the channel if needed.
    pub async fn subscribe(&self, user_id: i64) -> broadcast::Receiver<String> {
        // Fast path: channel already exists
        {
            let read_guard = self.channels.read().await;
            if let Some(sender) = read_guard.get(&user_id) {
                return sender.subscribe();
            }
        }

        // Slow path: create channel
        let mut write_guard = self.channels.write().await;
        // Double-check pattern to avoid racing another subscriber
        if let Some(sender) = write_guard.get(&user_id) {
            return sender.subscribe();
        }

        let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
        write_guard.insert(user_id, sender);
        receiver
    }

    /// Publish a payload to a user's sessions. Returns the number of
    /// sessions reached; zero when nobody is connected.
    pub async fn publish(&self, user_id: i64, payload: String) -> usize {
        let channels = self.channels.read().await;
        let Some(sender) = channels.get(&user_id) else {
            return 0;
        };

        match sender.send(payload) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!(user_id, "No live subscribers for realtime payload");
                0
            }
        }
    }

    /// Drop a user's channel once its last subscriber is gone.
    pub async fn release(&self, user_id: i64) {
        let mut channels = self.channels.write().await;
        if let Some(sender) = channels.get(&user_id) {
            if sender.receiver_count() == 0 {
                channels.remove(&user_id);
            }
        }
    }
}
