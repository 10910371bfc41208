//! RelayCast - Session-aware message router
//!
//! Bridges a pub/sub backend with a population of persistent client
//! connections, multiplexing many live connections per logical identity and
//! translating between a compact delimited wire message and per-connection
//! delivery events.
//!
//! ## Architecture
//!
//! ```text
//! Pub/Sub (downlink) → Codec → Dispatcher → Delivery sink (transport)
//! Transport connect/disconnect → Registry → Reporter → Pub/Sub (uplink)
//! ```
//!
//! The transport layer (WebSocket framing, HTTP) is an external collaborator:
//! it feeds [`transport::ConnectionEvent`]s in and consumes
//! [`transport::Outgoing`] deliveries out.

// Compile-time feature validation: exactly one pub/sub backend required
#[cfg(not(any(feature = "redis", feature = "memory")))]
compile_error!(
    "RelayCast requires a pub/sub backend. Enable: --features redis OR --features memory"
);

// Enforce mutual exclusivity
#[cfg(all(feature = "redis", feature = "memory"))]
compile_error!("Only one pub/sub backend can be enabled. Choose redis OR memory, not both.");

pub mod codec;
pub mod config;
pub mod dispatch;
pub mod hub;
pub mod lifecycle;
pub mod pubsub;
pub mod registry;
pub mod rooms;
pub mod session;
pub mod transport;

pub use codec::{Decoded, InboundMessage, LifecycleAction, LifecycleEnvelope, MessageKind};
pub use config::Config;
pub use dispatch::Delivery;
pub use hub::Hub;
pub use lifecycle::Reporter;
pub use pubsub::PubSub;
pub use registry::Registry;
pub use rooms::{BroadcastGroup, Rooms};
pub use session::Session;
pub use transport::{ConnectionEvent, Outgoing};

#[cfg(feature = "redis")]
pub use pubsub::RedisPubSub;

#[cfg(feature = "memory")]
pub use pubsub::MemoryPubSub;
