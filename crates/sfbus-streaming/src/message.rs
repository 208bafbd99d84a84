//! Bayeux message envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Meta channel for handshakes.
pub const META_HANDSHAKE: &str = "/meta/handshake";
/// Meta channel for long-poll connects.
pub const META_CONNECT: &str = "/meta/connect";
/// Meta channel for subscribe requests.
pub const META_SUBSCRIBE: &str = "/meta/subscribe";
/// Meta channel for unsubscribe requests.
pub const META_UNSUBSCRIBE: &str = "/meta/unsubscribe";

/// Prefix of platform-event channels.
pub const EVENT_CHANNEL_PREFIX: &str = "/event/";

/// Channel name for a platform event type, e.g. `/event/Address_Request__e`.
#[must_use]
pub fn event_channel(event_type: &str) -> String {
    format!("{EVENT_CHANNEL_PREFIX}{event_type}")
}

/// A Bayeux message, inbound or outbound. Unknown fields are preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Channel the message is addressed to.
    pub channel: String,

    /// Message id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Client id assigned at handshake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Target channel of a subscribe/unsubscribe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,

    /// Outcome of a meta request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful: Option<bool>,

    /// Event data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Extension fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Map<String, Value>>,

    /// Error string on failed meta responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Anything else.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Create an empty message on a channel.
    #[must_use]
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            ..Self::default()
        }
    }

    /// Create a subscribe request for `subscription`.
    #[must_use]
    pub fn subscribe(subscription: impl Into<String>) -> Self {
        Self {
            subscription: Some(subscription.into()),
            ..Self::new(META_SUBSCRIBE)
        }
    }

    /// Create a delivered event on `channel`.
    #[must_use]
    pub fn event(channel: impl Into<String>, data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::new(channel)
        }
    }

    /// Check if this message is on a `/meta/` channel.
    #[must_use]
    pub fn is_meta(&self) -> bool {
        self.channel.starts_with("/meta/")
    }

    /// Check if this is a subscribe request.
    #[must_use]
    pub fn is_subscribe(&self) -> bool {
        self.channel == META_SUBSCRIBE
    }

    /// Server-issued replay id at `data.event.replayId`.
    #[must_use]
    pub fn replay_id(&self) -> Option<i64> {
        self.data
            .as_ref()?
            .get("event")?
            .get("replayId")?
            .as_i64()
    }

    /// Event payload at `data.payload`.
    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.data.as_ref()?.get("payload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_delivered_platform_event() {
        let raw = json!({
            "channel": "/event/Address_Request__e",
            "clientId": "abc",
            "data": {
                "schema": "xyz",
                "payload": { "City__c": "Oslo" },
                "event": { "replayId": 42 }
            }
        });
        let msg: Message = serde_json::from_value(raw).unwrap();

        assert_eq!(msg.channel, "/event/Address_Request__e");
        assert_eq!(msg.client_id.as_deref(), Some("abc"));
        assert_eq!(msg.replay_id(), Some(42));
        assert_eq!(msg.payload(), Some(&json!({ "City__c": "Oslo" })));
        assert!(!msg.is_meta());
    }

    #[test]
    fn replay_id_absent_without_event_envelope() {
        let msg = Message::event("/event/Foo__e", json!({ "payload": {} }));
        assert_eq!(msg.replay_id(), None);
        assert_eq!(Message::new("/event/Foo__e").replay_id(), None);
    }

    #[test]
    fn subscribe_request_serializes_camel_case() {
        let mut msg = Message::subscribe("/event/Foo__e");
        msg.client_id = Some("c1".into());
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(
            value,
            json!({
                "channel": "/meta/subscribe",
                "clientId": "c1",
                "subscription": "/event/Foo__e"
            })
        );
        assert!(msg.is_subscribe());
        assert!(msg.is_meta());
    }

    #[test]
    fn unknown_fields_survive() {
        let raw = json!({ "channel": "/meta/connect", "advice": { "reconnect": "retry" } });
        let msg: Message = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(msg.extra.get("advice"), Some(&json!({ "reconnect": "retry" })));
        assert_eq!(serde_json::to_value(&msg).unwrap(), raw);
    }

    #[test]
    fn event_channel_prefixes_type() {
        assert_eq!(
            event_channel("Address_Request__e"),
            "/event/Address_Request__e"
        );
    }
}
