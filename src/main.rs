//! RelayCast - Session-aware message router
//!
//! Subscribes to the pub/sub downlink, routes decoded messages to the
//! connections registered for their target identity or namespace, and
//! reports connect/disconnect transitions on the uplink channel.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use relaycast::{
    Config, ConnectionEvent, Hub, Outgoing, PubSub, Reporter,
};

#[cfg(feature = "redis")]
use relaycast::RedisPubSub;

#[cfg(feature = "memory")]
use relaycast::MemoryPubSub;

#[cfg(feature = "redis")]
type PubSubImpl = RedisPubSub;
#[cfg(feature = "memory")]
type PubSubImpl = MemoryPubSub;

#[derive(Parser, Debug)]
#[command(name = "relaycast")]
#[command(about = "Session-aware message router between pub/sub and client connections")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

async fn init_pubsub(config: &Config) -> anyhow::Result<Arc<PubSubImpl>> {
    #[cfg(feature = "memory")]
    {
        let _ = config;
        info!("Memory pub/sub initialized (single-process only)");
        Ok(Arc::new(MemoryPubSub::new()))
    }

    #[cfg(all(not(feature = "memory"), feature = "redis"))]
    {
        let pubsub = RedisPubSub::new(&config.redis_url()).await?;
        info!(url = %config.redis_url(), "Redis pub/sub connected");
        Ok(Arc::new(pubsub))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(&args.log_level)
        .init();

    info!("RelayCast v{}", env!("CARGO_PKG_VERSION"));

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        inbound = %config.inbound_channel,
        uplink = %config.uplink_channel,
        "Starting RelayCast"
    );

    let pubsub = init_pubsub(&config).await?;

    // Delivery sink consumed by the transport collaborator
    let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<Outgoing>(config.outgoing_buffer);

    // Connection lifecycle events fed by the transport collaborator; the
    // sender is what a transport integration would hold on to
    let (event_tx, mut event_rx) = mpsc::channel::<ConnectionEvent>(256);
    let _event_tx = event_tx;

    let hub = Arc::new(Hub::new(outgoing_tx));
    let reporter = Reporter::new(pubsub.clone(), config.uplink_channel.clone());

    // Subscribe the downlink and forward raw payloads into the router loop
    pubsub.subscribe(&config.inbound_channel).await?;

    let (inbound_tx, mut inbound_rx) = mpsc::channel::<String>(1024);
    {
        let ps = pubsub.clone();
        let inbound_channel = config.inbound_channel.clone();
        tokio::spawn(async move {
            info!("Starting pub/sub listener");
            if let Err(e) = ps
                .listen(move |channel, payload| {
                    if channel != inbound_channel {
                        return;
                    }
                    match String::from_utf8(payload) {
                        Ok(raw) => {
                            if inbound_tx.try_send(raw).is_err() {
                                tracing::warn!("inbound queue full; dropping message");
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "dropping non-UTF8 inbound message");
                        }
                    }
                })
                .await
            {
                error!(error = %e, "Pub/sub listener error");
            }
        });
    }

    // Drain the delivery sink: this is the hand-off point to the transport's
    // send primitives
    tokio::spawn(async move {
        while let Some(outgoing) = outgoing_rx.recv().await {
            match outgoing {
                Outgoing::ToConnection { handle, label, content } => {
                    debug!(handle, label, len = content.len(), "delivery to connection");
                }
                Outgoing::ToGroup { group, label, content } => {
                    debug!(namespace = %group, label, len = content.len(), "delivery to group");
                }
            }
        }
    });

    // Router loop over the two independent event sources
    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                match event {
                    ConnectionEvent::Connect { namespace, identity, handle } => {
                        let sessions = hub.on_connect(&namespace, &identity, handle);
                        reporter.connected(&namespace, &identity, handle, sessions).await;
                    }
                    ConnectionEvent::Disconnect { handle } => {
                        if let Some(dereg) = hub.on_disconnect(handle) {
                            reporter
                                .disconnected(&dereg.namespace, &dereg.identity, handle, dereg.remaining)
                                .await;
                        }
                    }
                }
            }
            raw = inbound_rx.recv() => {
                let Some(raw) = raw else { break };
                hub.handle_inbound(&raw).await;
            }
        }
    }

    info!("RelayCast shutdown");
    Ok(())
}
