//! Pub/Sub backend abstraction
//!
//! The router consumes one subscribed downlink channel and publishes
//! lifecycle envelopes on an uplink channel; both sides go through this
//! trait.
//!
//! # Features
//!
//! Exactly one backend must be enabled at compile time:
//!
//! - `redis` - Redis pub/sub, the production backend (default)
//! - `memory` - In-memory broadcast for single-process/development use

#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "redis")]
pub use redis::RedisPubSub;

#[cfg(feature = "memory")]
mod memory;

#[cfg(feature = "memory")]
pub use memory::MemoryPubSub;

use async_trait::async_trait;

/// Pub/Sub backend trait
///
/// Delivery within a subscribed channel is assumed reliable and ordered by
/// the backend; the router adds no acknowledgment or retry on top.
#[async_trait]
pub trait PubSub: Send + Sync {
    /// Publish a payload to a channel (fire-and-forget)
    async fn publish(&self, channel: &str, payload: &[u8]) -> anyhow::Result<()>;

    /// Start receiving messages published to a channel
    async fn subscribe(&self, channel: &str) -> anyhow::Result<()>;

    /// Stop receiving messages from a channel
    async fn unsubscribe(&self, channel: &str) -> anyhow::Result<()>;

    /// Run the listener loop
    ///
    /// Spawned as a background task; invokes the callback with
    /// (channel, payload) for every message on a subscribed channel.
    async fn listen<F>(&self, callback: F) -> anyhow::Result<()>
    where
        F: Fn(String, Vec<u8>) + Send + Sync + 'static;
}
