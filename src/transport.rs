//! Transport boundary types
//!
//! The transport collaborator owns connection framing and fan-out mechanics.
//! It feeds [`ConnectionEvent`]s into the router and drains [`Outgoing`]
//! deliveries from the hub's mpsc sink. The router never waits for delivery
//! confirmation.

use crate::rooms::BroadcastGroup;

/// Connection lifecycle events from the transport collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connect {
        namespace: String,
        identity: String,
        handle: u64,
    },
    Disconnect {
        handle: u64,
    },
}

/// A delivery handed to the transport collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Send to one connection
    ToConnection {
        handle: u64,
        label: &'static str,
        content: String,
    },
    /// Group send covering every connection joined to a namespace
    ToGroup {
        group: BroadcastGroup,
        label: &'static str,
        content: String,
    },
}
