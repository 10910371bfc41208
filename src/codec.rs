//! Wire codec
//!
//! Decodes the delimited inbound message format and encodes the outbound
//! lifecycle envelope.
//!
//! ## Inbound grammar
//!
//! A raw pub/sub payload is a `:`-delimited string:
//!
//! ```text
//! namespace:kind:target:content[:payload]
//! ```
//!
//! Missing trailing fields decode as empty strings rather than failing, so
//! truncated upstream messages degrade gracefully. The optional payload field
//! is the remainder of the string after the fourth separator; when present it
//! is re-joined onto the content with the separator, which reconstructs
//! content that itself contained `:`.
//!
//! ## Lifecycle envelope
//!
//! Connect/disconnect transitions are published upstream as base64-wrapped
//! JSON with an `action`/`params` shape. This is the single canonical
//! envelope format; raw-JSON variants are not supported.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// Field separator for the inbound wire format
pub const SEPARATOR: char = ':';

/// Reserved control token for a future configuration handshake.
/// Recognized and ignored, never parsed as data.
pub const CONTROL_TOKEN: &str = "config";

/// Target value that addresses a whole namespace instead of one identity
pub const BROADCAST_TARGET: &str = "broadcast";

/// Delivery labels
pub const DATA_LABEL: &str = "data";
pub const MESSAGE_LABEL: &str = "message";
pub const BROADCAST_LABEL: &str = "broadcast";
pub const NOTIFICATION_LABEL: &str = "notification";

/// Kind of an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Data,
    Message,
    Notification,
    /// Forward-compatible catch-all; the dispatcher discards these
    Other(String),
}

impl MessageKind {
    fn parse(raw: &str) -> Self {
        match raw {
            "data" => Self::Data,
            "message" => Self::Message,
            "notification" => Self::Notification,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A decoded inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Owning application namespace (scopes broadcast)
    pub namespace: String,
    pub kind: MessageKind,
    /// Identity token, or [`BROADCAST_TARGET`]
    pub target: String,
    /// Delivery content, with any payload field already re-joined
    pub content: String,
}

/// Result of decoding a raw inbound payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// The reserved control token; callers ignore it
    Control,
    Message(InboundMessage),
}

/// Decode a raw inbound pub/sub payload
///
/// Fewer than four fields is not an error: missing fields are empty strings.
pub fn decode(raw: &str) -> Result<Decoded, DecodeError> {
    if raw.is_empty() {
        return Err(DecodeError::Empty);
    }

    if raw == CONTROL_TOKEN {
        return Ok(Decoded::Control);
    }

    // splitn keeps the remainder intact in the last field, so content
    // containing the separator survives the payload re-join below
    let mut fields = raw.splitn(5, SEPARATOR);
    let namespace = fields.next().unwrap_or("").to_string();
    let kind = MessageKind::parse(fields.next().unwrap_or(""));
    let target = fields.next().unwrap_or("").to_string();
    let content = fields.next().unwrap_or("");
    let payload = fields.next().unwrap_or("");

    let content = if payload.is_empty() {
        content.to_string()
    } else {
        format!("{content}{SEPARATOR}{payload}")
    };

    Ok(Decoded::Message(InboundMessage {
        namespace,
        kind,
        target,
        content,
    }))
}

/// Connection lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleAction {
    Connect,
    Disconnect,
}

/// Envelope published on the uplink channel for every connect and every
/// completed disconnect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEnvelope {
    pub action: LifecycleAction,
    pub params: LifecycleParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleParams {
    pub namespace: String,
    pub identity: String,
    pub handle: u64,
    /// Connection count for the identity immediately after the transition
    pub sessions: usize,
}

/// Encode a lifecycle envelope as base64-wrapped JSON
pub fn encode_envelope(envelope: &LifecycleEnvelope) -> String {
    // LifecycleEnvelope contains only string/integer fields; serialization
    // cannot fail
    let json = serde_json::to_vec(envelope).unwrap_or_default();
    BASE64.encode(json)
}

/// Decode a base64-wrapped lifecycle envelope
pub fn decode_envelope(encoded: &str) -> Result<LifecycleEnvelope, DecodeError> {
    let json = BASE64.decode(encoded)?;
    Ok(serde_json::from_slice(&json)?)
}

/// Wire codec errors
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("empty message")]
    Empty,
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_message(raw: &str) -> InboundMessage {
        match decode(raw).unwrap() {
            Decoded::Message(m) => m,
            Decoded::Control => panic!("expected Message"),
        }
    }

    #[test]
    fn test_decode_data_message() {
        let msg = decode_message("shop1:data:alice:{\"x\":1}");
        assert_eq!(msg.namespace, "shop1");
        assert_eq!(msg.kind, MessageKind::Data);
        assert_eq!(msg.target, "alice");
        assert_eq!(msg.content, "{\"x\":1}");
    }

    #[test]
    fn test_decode_broadcast_message() {
        let msg = decode_message("shop1:message:broadcast:hello");
        assert_eq!(msg.kind, MessageKind::Message);
        assert_eq!(msg.target, BROADCAST_TARGET);
        assert_eq!(msg.content, "hello");
    }

    #[test]
    fn test_decode_payload_rejoined() {
        // Content containing the separator arrives split across the content
        // and payload fields; decoding must reconstruct it
        let msg = decode_message("shop1:data:alice:invite:{\"code\":\"xyz\"}");
        assert_eq!(msg.content, "invite:{\"code\":\"xyz\"}");
    }

    #[test]
    fn test_decode_payload_with_nested_separators() {
        // Everything after the fourth separator belongs to the payload
        let msg = decode_message("shop1:data:alice:a:b:c:d");
        assert_eq!(msg.content, "a:b:c:d");
    }

    #[test]
    fn test_decode_without_payload() {
        let msg = decode_message("shop1:notification:alice:paired");
        assert_eq!(msg.kind, MessageKind::Notification);
        assert_eq!(msg.content, "paired");
    }

    #[test]
    fn test_decode_lenient_missing_fields() {
        // Truncated messages decode with empty fields, never an error
        let msg = decode_message("shop1:data");
        assert_eq!(msg.namespace, "shop1");
        assert_eq!(msg.kind, MessageKind::Data);
        assert_eq!(msg.target, "");
        assert_eq!(msg.content, "");

        let msg = decode_message("shop1");
        assert_eq!(msg.namespace, "shop1");
        assert_eq!(msg.kind, MessageKind::Other(String::new()));
    }

    #[test]
    fn test_decode_empty_is_error() {
        assert!(matches!(decode(""), Err(DecodeError::Empty)));
    }

    #[test]
    fn test_decode_control_token() {
        assert_eq!(decode("config").unwrap(), Decoded::Control);
    }

    #[test]
    fn test_decode_unknown_kind() {
        let msg = decode_message("shop1:telemetry:alice:x");
        assert_eq!(msg.kind, MessageKind::Other("telemetry".to_string()));
    }

    #[test]
    fn test_envelope_roundtrip() {
        let envelope = LifecycleEnvelope {
            action: LifecycleAction::Connect,
            params: LifecycleParams {
                namespace: "shop1".to_string(),
                identity: "alice".to_string(),
                handle: 7,
                sessions: 2,
            },
        };

        let encoded = encode_envelope(&envelope);
        let decoded = decode_envelope(&encoded).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_envelope_is_base64_wrapped_json() {
        let envelope = LifecycleEnvelope {
            action: LifecycleAction::Disconnect,
            params: LifecycleParams {
                namespace: "shop1".to_string(),
                identity: "alice".to_string(),
                handle: 3,
                sessions: 0,
            },
        };

        let encoded = encode_envelope(&envelope);
        let json = BASE64.decode(&encoded).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["action"], "disconnect");
        assert_eq!(value["params"]["identity"], "alice");
        assert_eq!(value["params"]["sessions"], 0);
    }

    #[test]
    fn test_decode_envelope_rejects_garbage() {
        assert!(decode_envelope("not-base64!!").is_err());
        // Valid base64 but not an envelope
        assert!(decode_envelope(&BASE64.encode(b"[1,2,3]")).is_err());
    }
}
