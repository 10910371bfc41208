//! Routing hub
//!
//! Composition root for the routing core: owns the session registry and
//! namespace membership, runs inbound messages through the dispatcher, and
//! pushes the resolved deliveries onto the transport's outgoing sink.
//!
//! Safe to call concurrently from both event sources; no operation blocks on
//! I/O beyond the bounded outgoing channel.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::codec::{self, Decoded};
use crate::dispatch::{self, Delivery};
use crate::registry::{Deregistration, Registry, RegistryError};
use crate::rooms::Rooms;
use crate::transport::Outgoing;

pub struct Hub {
    registry: Registry,
    rooms: Rooms,

    /// Delivery sink consumed by the transport collaborator
    outgoing_tx: mpsc::Sender<Outgoing>,
}

impl Hub {
    pub fn new(outgoing_tx: mpsc::Sender<Outgoing>) -> Self {
        Self {
            registry: Registry::new(),
            rooms: Rooms::new(),
            outgoing_tx,
        }
    }

    /// Handle a client connect: register the session and join the namespace
    /// group. Returns the post-connect session count for the identity, which
    /// the caller reports upstream.
    pub fn on_connect(&self, namespace: &str, identity: &str, handle: u64) -> usize {
        let sessions = self.registry.register(namespace, identity, handle);
        self.rooms.join(namespace, handle);
        sessions
    }

    /// Handle a client disconnect.
    ///
    /// Returns `None` for an unregistered handle (an already-closed socket or
    /// a redundant disconnect signal); the caller emits no envelope for that
    /// case.
    pub fn on_disconnect(&self, handle: u64) -> Option<Deregistration> {
        self.rooms.forget(handle);

        match self.registry.deregister(handle) {
            Ok(dereg) => Some(dereg),
            Err(RegistryError::UnknownHandle(_)) => {
                warn!(handle, "disconnect for unregistered handle; ignored");
                None
            }
        }
    }

    /// Handle a raw inbound pub/sub payload: decode, resolve, deliver.
    pub async fn handle_inbound(&self, raw: &str) {
        let decoded = match codec::decode(raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(error = %e, "dropping undecodable inbound message");
                return;
            }
        };

        let message = match decoded {
            Decoded::Control => {
                // Reserved for a future configuration handshake
                debug!("control token received; ignored");
                return;
            }
            Decoded::Message(message) => message,
        };

        for delivery in dispatch::resolve(&message, &self.registry, &self.rooms) {
            self.deliver(delivery).await;
        }
    }

    async fn deliver(&self, delivery: Delivery) {
        match delivery {
            Delivery::Connections {
                label,
                handles,
                content,
            } => {
                for handle in handles {
                    let outgoing = Outgoing::ToConnection {
                        handle,
                        label,
                        content: content.clone(),
                    };
                    if let Err(e) = self.outgoing_tx.send(outgoing).await {
                        warn!(handle, error = %e, "delivery sink closed");
                        return;
                    }
                }
            }
            Delivery::Group {
                label,
                group,
                content,
            } => {
                let namespace = group.namespace().to_string();
                let outgoing = Outgoing::ToGroup {
                    group,
                    label,
                    content,
                };
                if let Err(e) = self.outgoing_tx.send(outgoing).await {
                    warn!(namespace = %namespace, error = %e, "delivery sink closed");
                }
            }
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn rooms(&self) -> &Rooms {
        &self.rooms
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("sessions", &self.registry.session_count())
            .field("connections", &self.registry.connection_count())
            .finish()
    }
}
