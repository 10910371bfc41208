//! In-memory pub/sub backend using tokio::sync::broadcast
//!
//! Single-process only, no persistence; lagging receivers lose messages.
//! Intended for development and tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{RwLock, broadcast};

use crate::pubsub::PubSub;

/// Default buffer size for broadcast channels
const DEFAULT_BUFFER_SIZE: usize = 1024;

/// In-memory pub/sub
///
/// Each channel name gets its own broadcast channel; messages are delivered
/// to all current subscribers immediately.
#[derive(Clone)]
pub struct MemoryPubSub {
    channels: Arc<DashMap<String, broadcast::Sender<Vec<u8>>>>,
    subscriptions: Arc<RwLock<HashSet<String>>>,
    buffer_size: usize,
}

impl MemoryPubSub {
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Larger buffers reduce message loss for slow receivers at the cost of
    /// memory
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            subscriptions: Arc::new(RwLock::new(HashSet::new())),
            buffer_size,
        }
    }

    fn get_or_create_channel(&self, channel: &str) -> broadcast::Sender<Vec<u8>> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer_size).0)
            .clone()
    }
}

impl Default for MemoryPubSub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PubSub for MemoryPubSub {
    async fn publish(&self, channel: &str, payload: &[u8]) -> anyhow::Result<()> {
        let tx = self.get_or_create_channel(channel);

        // send() errs only when there are no receivers; fire-and-forget
        let _ = tx.send(payload.to_vec());

        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> anyhow::Result<()> {
        self.get_or_create_channel(channel);

        let mut subs = self.subscriptions.write().await;
        subs.insert(channel.to_string());

        Ok(())
    }

    async fn unsubscribe(&self, channel: &str) -> anyhow::Result<()> {
        let mut subs = self.subscriptions.write().await;
        subs.remove(channel);

        // Drop the channel once nobody is listening
        if let Some(entry) = self.channels.get(channel)
            && entry.receiver_count() == 0
        {
            drop(entry);
            self.channels.remove(channel);
        }

        Ok(())
    }

    async fn listen<F>(&self, callback: F) -> anyhow::Result<()>
    where
        F: Fn(String, Vec<u8>) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        let mut receivers: HashMap<String, broadcast::Receiver<Vec<u8>>> = HashMap::new();

        loop {
            // Sync receivers with the current subscription set
            {
                let subs = self.subscriptions.read().await;

                for channel in subs.iter() {
                    if !receivers.contains_key(channel)
                        && let Some(tx) = self.channels.get(channel)
                    {
                        receivers.insert(channel.clone(), tx.subscribe());
                    }
                }

                receivers.retain(|channel, _| subs.contains(channel));
            }

            if receivers.is_empty() {
                tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
                continue;
            }

            let mut received_any = false;

            for (channel, rx) in receivers.iter_mut() {
                match rx.try_recv() {
                    Ok(payload) => {
                        callback(channel.clone(), payload);
                        received_any = true;
                    }
                    Err(broadcast::error::TryRecvError::Lagged(n)) => {
                        tracing::warn!(channel = %channel, lost = n, "listener lagged");
                    }
                    Err(broadcast::error::TryRecvError::Empty) => {}
                    Err(broadcast::error::TryRecvError::Closed) => {
                        // Cleaned up on the next sync pass
                    }
                }
            }

            if !received_any {
                // Yield to avoid busy-spinning
                tokio::time::sleep(tokio::time::Duration::from_millis(1)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let pubsub = MemoryPubSub::new();
        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = received.clone();

        pubsub.subscribe("relay:inbound").await.unwrap();

        let listener = pubsub.clone();
        let handle = tokio::spawn(async move {
            let _ = listener
                .listen(move |_channel, _payload| {
                    received_clone.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;

        pubsub.publish("relay:inbound", b"shop1:message:broadcast:hi").await.unwrap();
        pubsub.publish("relay:inbound", b"shop1:data:alice:x").await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(received.load(Ordering::SeqCst), 2);

        handle.abort();
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let pubsub = MemoryPubSub::new();

        pubsub.subscribe("relay:inbound").await.unwrap();
        assert!(pubsub.subscriptions.read().await.contains("relay:inbound"));

        pubsub.unsubscribe("relay:inbound").await.unwrap();
        assert!(!pubsub.subscriptions.read().await.contains("relay:inbound"));
    }

    #[test]
    fn test_default_buffer() {
        let pubsub = MemoryPubSub::default();
        assert_eq!(pubsub.buffer_size, DEFAULT_BUFFER_SIZE);
    }
}
