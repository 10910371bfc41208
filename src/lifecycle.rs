//! Lifecycle reporter
//!
//! Publishes an encoded envelope on the uplink channel whenever a connection
//! registers or fully deregisters. Publishing is best-effort: a failure is
//! logged and the registry mutation it describes stands regardless, because
//! the registry, not the upstream consumer, is the authoritative state.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::codec::{self, LifecycleAction, LifecycleEnvelope, LifecycleParams};
use crate::pubsub::PubSub;

pub struct Reporter<P> {
    pubsub: Arc<P>,
    channel: String,
}

impl<P: PubSub> Reporter<P> {
    pub fn new(pubsub: Arc<P>, channel: impl Into<String>) -> Self {
        Self {
            pubsub,
            channel: channel.into(),
        }
    }

    /// Report a registered connection, with the post-connect session count
    pub async fn connected(&self, namespace: &str, identity: &str, handle: u64, sessions: usize) {
        self.publish(LifecycleAction::Connect, namespace, identity, handle, sessions)
            .await;
    }

    /// Report a deregistered connection, with the post-removal session count
    /// (0 when the last handle left)
    pub async fn disconnected(&self, namespace: &str, identity: &str, handle: u64, sessions: usize) {
        self.publish(LifecycleAction::Disconnect, namespace, identity, handle, sessions)
            .await;
    }

    async fn publish(
        &self,
        action: LifecycleAction,
        namespace: &str,
        identity: &str,
        handle: u64,
        sessions: usize,
    ) {
        let envelope = LifecycleEnvelope {
            action,
            params: LifecycleParams {
                namespace: namespace.to_string(),
                identity: identity.to_string(),
                handle,
                sessions,
            },
        };

        let encoded = codec::encode_envelope(&envelope);

        // At-most-once: no retry, no rollback of the mutation being reported
        match self.pubsub.publish(&self.channel, encoded.as_bytes()).await {
            Ok(()) => {
                debug!(channel = %self.channel, ?action, identity, sessions, "lifecycle envelope published");
            }
            Err(e) => {
                warn!(channel = %self.channel, ?action, identity, error = %e, "failed to publish lifecycle envelope");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_envelope;
    use crate::hub::Hub;
    use async_trait::async_trait;
    use tokio::sync::{Mutex, mpsc};

    /// Records publishes; optionally fails them all
    #[derive(Default)]
    struct RecordingPubSub {
        published: Mutex<Vec<(String, Vec<u8>)>>,
        fail: bool,
    }

    #[async_trait]
    impl PubSub for RecordingPubSub {
        async fn publish(&self, channel: &str, payload: &[u8]) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("upstream rejected publish");
            }
            self.published
                .lock()
                .await
                .push((channel.to_string(), payload.to_vec()));
            Ok(())
        }

        async fn subscribe(&self, _channel: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn unsubscribe(&self, _channel: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn listen<F>(&self, _callback: F) -> anyhow::Result<()>
        where
            F: Fn(String, Vec<u8>) + Send + Sync + 'static,
        {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_connect_publishes_envelope() {
        let pubsub = Arc::new(RecordingPubSub::default());
        let reporter = Reporter::new(pubsub.clone(), "relay:app");

        reporter.connected("shop1", "alice", 7, 2).await;

        let published = pubsub.published.lock().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "relay:app");

        let encoded = String::from_utf8(published[0].1.clone()).unwrap();
        let envelope = decode_envelope(&encoded).unwrap();
        assert_eq!(envelope.action, LifecycleAction::Connect);
        assert_eq!(envelope.params.identity, "alice");
        assert_eq!(envelope.params.namespace, "shop1");
        assert_eq!(envelope.params.handle, 7);
        assert_eq!(envelope.params.sessions, 2);
    }

    #[tokio::test]
    async fn test_disconnect_publishes_remaining_count() {
        let pubsub = Arc::new(RecordingPubSub::default());
        let reporter = Reporter::new(pubsub.clone(), "relay:app");

        reporter.disconnected("shop1", "alice", 7, 0).await;

        let published = pubsub.published.lock().await;
        let encoded = String::from_utf8(published[0].1.clone()).unwrap();
        let envelope = decode_envelope(&encoded).unwrap();
        assert_eq!(envelope.action, LifecycleAction::Disconnect);
        assert_eq!(envelope.params.sessions, 0);
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_roll_back_registry() {
        let pubsub = Arc::new(RecordingPubSub {
            fail: true,
            ..Default::default()
        });
        let reporter = Reporter::new(pubsub, "relay:app");

        let (tx, _rx) = mpsc::channel(8);
        let hub = Hub::new(tx);

        let sessions = hub.on_connect("shop1", "alice", 1);
        reporter.connected("shop1", "alice", 1, sessions).await;

        // The registry mutation stands even though the publish failed
        assert_eq!(hub.registry().connections_for("alice"), vec![1]);
    }
}
