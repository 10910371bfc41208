//! Dispatcher
//!
//! Resolves a decoded inbound message into zero or more deliveries using the
//! registry and namespace membership. Delivery is fire-and-forget: a target
//! with no live connections resolves to nothing, never to an error.

use tracing::debug;

use crate::codec::{
    BROADCAST_LABEL, BROADCAST_TARGET, DATA_LABEL, InboundMessage, MESSAGE_LABEL, MessageKind,
    NOTIFICATION_LABEL,
};
use crate::registry::Registry;
use crate::rooms::{BroadcastGroup, Rooms};

/// A resolved delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Unicast to every live connection of one identity, in arrival order
    Connections {
        label: &'static str,
        handles: Vec<u64>,
        content: String,
    },
    /// One group send covering a whole namespace. Inclusive: the sending
    /// connection, if subscribed, receives its own broadcast.
    Group {
        label: &'static str,
        group: BroadcastGroup,
        content: String,
    },
}

/// Resolve an inbound message to its deliveries.
///
/// Precedence: `data` unicasts; `message` to the broadcast target fans out to
/// the namespace group; any other `message` and `notification` unicast;
/// unknown kinds are discarded.
pub fn resolve(message: &InboundMessage, registry: &Registry, rooms: &Rooms) -> Vec<Delivery> {
    match &message.kind {
        MessageKind::Data => unicast(DATA_LABEL, registry, message),
        MessageKind::Message if message.target == BROADCAST_TARGET => {
            vec![Delivery::Group {
                label: BROADCAST_LABEL,
                group: rooms.group(&message.namespace),
                content: message.content.clone(),
            }]
        }
        MessageKind::Message => unicast(MESSAGE_LABEL, registry, message),
        MessageKind::Notification => unicast(NOTIFICATION_LABEL, registry, message),
        MessageKind::Other(kind) => {
            debug!(kind = %kind, namespace = %message.namespace, "discarding message of unknown kind");
            Vec::new()
        }
    }
}

fn unicast(label: &'static str, registry: &Registry, message: &InboundMessage) -> Vec<Delivery> {
    let handles = registry.connections_for(&message.target);
    if handles.is_empty() {
        // Silent drop: delayed delivery after the user already left is a
        // normal, frequent outcome
        debug!(target = %message.target, label, "no live connections for target");
        return Vec::new();
    }

    vec![Delivery::Connections {
        label,
        handles,
        content: message.content.clone(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Decoded, decode};

    fn inbound(raw: &str) -> InboundMessage {
        match decode(raw).unwrap() {
            Decoded::Message(m) => m,
            Decoded::Control => panic!("expected Message"),
        }
    }

    #[test]
    fn test_data_fans_out_to_every_handle() {
        let registry = Registry::new();
        let rooms = Rooms::new();
        registry.register("shop1", "alice", 1);
        registry.register("shop1", "alice", 2);

        let deliveries = resolve(&inbound("shop1:data:alice:{\"x\":1}"), &registry, &rooms);
        assert_eq!(
            deliveries,
            vec![Delivery::Connections {
                label: "data",
                handles: vec![1, 2],
                content: "{\"x\":1}".to_string(),
            }]
        );
    }

    #[test]
    fn test_data_without_connections_is_dropped() {
        let registry = Registry::new();
        let rooms = Rooms::new();

        let deliveries = resolve(&inbound("shop1:data:ghost:payload"), &registry, &rooms);
        assert!(deliveries.is_empty());
    }

    #[test]
    fn test_broadcast_is_one_group_delivery() {
        let registry = Registry::new();
        let rooms = Rooms::new();
        registry.register("shop1", "alice", 1);
        rooms.join("shop1", 1);

        let deliveries = resolve(&inbound("shop1:message:broadcast:hello"), &registry, &rooms);
        assert_eq!(deliveries.len(), 1);
        match &deliveries[0] {
            Delivery::Group { label, group, content } => {
                assert_eq!(*label, "broadcast");
                assert_eq!(group.namespace(), "shop1");
                assert_eq!(content, "hello");
            }
            other => panic!("expected Group, got {other:?}"),
        }
    }

    #[test]
    fn test_message_to_identity_is_unicast() {
        let registry = Registry::new();
        let rooms = Rooms::new();
        registry.register("shop1", "bob", 5);

        let deliveries = resolve(&inbound("shop1:message:bob:hi"), &registry, &rooms);
        assert_eq!(
            deliveries,
            vec![Delivery::Connections {
                label: "message",
                handles: vec![5],
                content: "hi".to_string(),
            }]
        );
    }

    #[test]
    fn test_identity_named_like_broadcast_only_broadcasts_for_message_kind() {
        // The broadcast marker is only special for the message kind
        let registry = Registry::new();
        let rooms = Rooms::new();
        registry.register("shop1", "broadcast", 9);

        let deliveries = resolve(&inbound("shop1:data:broadcast:x"), &registry, &rooms);
        assert!(matches!(&deliveries[0], Delivery::Connections { handles, .. } if handles == &[9]));
    }

    #[test]
    fn test_notification_is_unicast() {
        let registry = Registry::new();
        let rooms = Rooms::new();
        registry.register("shop1", "alice", 1);

        let deliveries = resolve(&inbound("shop1:notification:alice:paired"), &registry, &rooms);
        assert_eq!(
            deliveries,
            vec![Delivery::Connections {
                label: "notification",
                handles: vec![1],
                content: "paired".to_string(),
            }]
        );
    }

    #[test]
    fn test_unknown_kind_is_discarded() {
        let registry = Registry::new();
        let rooms = Rooms::new();
        registry.register("shop1", "alice", 1);

        let deliveries = resolve(&inbound("shop1:telemetry:alice:x"), &registry, &rooms);
        assert!(deliveries.is_empty());
    }

    #[test]
    fn test_payload_field_travels_with_content() {
        let registry = Registry::new();
        let rooms = Rooms::new();
        registry.register("shop1", "alice", 1);

        let deliveries = resolve(
            &inbound("shop1:data:alice:invite:{\"code\":\"xyz\"}"),
            &registry,
            &rooms,
        );
        match &deliveries[0] {
            Delivery::Connections { content, .. } => {
                assert_eq!(content, "invite:{\"code\":\"xyz\"}")
            }
            other => panic!("expected Connections, got {other:?}"),
        }
    }
}
