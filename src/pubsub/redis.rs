//! Redis pub/sub backend
//!
//! Publishes over a shared connection manager; the listener holds a
//! dedicated connection (Redis pub/sub takes over the whole connection) and
//! reconnects with backoff on failure.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::RwLock;

use crate::pubsub::PubSub;

/// Delay before reconnecting a failed listener connection
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// How often the listener checks for subscription-set changes
const SUBSCRIPTION_POLL: Duration = Duration::from_millis(500);

/// Redis-backed pub/sub
pub struct RedisPubSub {
    client: redis::Client,
    manager: ConnectionManager,
    subscriptions: Arc<RwLock<HashSet<String>>>,
}

impl RedisPubSub {
    /// Connect to Redis, verifying the URL up front
    ///
    /// # Example
    /// ```ignore
    /// let pubsub = RedisPubSub::new("redis://localhost:6379/").await?;
    /// ```
    pub async fn new(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client.clone()).await?;

        Ok(Self {
            client,
            manager,
            subscriptions: Arc::new(RwLock::new(HashSet::new())),
        })
    }
}

#[async_trait]
impl PubSub for RedisPubSub {
    async fn publish(&self, channel: &str, payload: &[u8]) -> anyhow::Result<()> {
        // ConnectionManager clones share one multiplexed connection
        let mut conn = self.manager.clone();
        conn.publish::<_, _, ()>(channel, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> anyhow::Result<()> {
        let mut subs = self.subscriptions.write().await;
        subs.insert(channel.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, channel: &str) -> anyhow::Result<()> {
        let mut subs = self.subscriptions.write().await;
        subs.remove(channel);
        Ok(())
    }

    async fn listen<F>(&self, callback: F) -> anyhow::Result<()>
    where
        F: Fn(String, Vec<u8>) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);

        loop {
            match Self::run_listener(&self.client, &self.subscriptions, callback.clone()).await {
                Ok(()) => {
                    // Subscription set changed; reconnect with the new set
                }
                Err(e) => {
                    tracing::error!(error = %e, "pub/sub listener error, reconnecting");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }
}

impl RedisPubSub {
    /// Run one listener connection until it fails or the subscription set
    /// changes. Returns Ok on a set change so the caller resubscribes.
    async fn run_listener<F>(
        client: &redis::Client,
        subscriptions: &Arc<RwLock<HashSet<String>>>,
        callback: Arc<F>,
    ) -> anyhow::Result<()>
    where
        F: Fn(String, Vec<u8>) + Send + Sync + 'static,
    {
        let current: Vec<String> = subscriptions.read().await.iter().cloned().collect();

        if current.is_empty() {
            tokio::time::sleep(SUBSCRIPTION_POLL).await;
            return Ok(());
        }

        // Pub/sub requires a dedicated connection, not the multiplexed one
        let conn = client.get_async_connection().await?;
        let mut pubsub = conn.into_pubsub();
        for channel in &current {
            pubsub.subscribe(channel).await?;
            tracing::info!(channel = %channel, "subscribed to channel");
        }

        let mut stream = pubsub.on_message();

        loop {
            tokio::select! {
                msg = stream.next() => {
                    match msg {
                        Some(msg) => {
                            let channel = msg.get_channel_name().to_string();
                            let payload: Vec<u8> = msg.get_payload()?;
                            callback(channel, payload);
                        }
                        None => {
                            anyhow::bail!("pub/sub connection closed");
                        }
                    }
                }
                _ = tokio::time::sleep(SUBSCRIPTION_POLL) => {
                    let subs = subscriptions.read().await;
                    let changed = subs.len() != current.len()
                        || !current.iter().all(|c| subs.contains(c));
                    if changed {
                        return Ok(());
                    }
                }
            }
        }
    }
}
