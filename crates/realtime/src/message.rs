//! Wire model for the push endpoint.
//!
//! Inbound frames are JSON objects routed on their `type` field:
//!
//! ```json
//! { "type": "stats_update", "data": { "totalServers": 4 } }
//! ```
//!
//! The `data` field is the payload handed to listeners. When it is absent the
//! whole object is the payload, which lets the server send flat messages such
//! as `{ "type": "subscribed", "topic": "stats" }`.
//!
//! Outbound control frames are tagged the same way:
//!
//! ```json
//! { "type": "subscribe", "topic": "stats" }
//! { "type": "ping" }
//! ```

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::error::{RealtimeError, Result};

/// Message types emitted by the monitoring server.
pub mod message_types {
    pub const STATS_UPDATE: &str = "stats_update";
    pub const ACTIVITY_UPDATE: &str = "activity_update";
    pub const ALERT: &str = "alert";
    pub const SUBSCRIBED: &str = "subscribed";
    pub const UNSUBSCRIBED: &str = "unsubscribed";
    pub const PONG: &str = "pong";
}

/// A routed inbound message: the routing key plus an opaque payload.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub message_type: String,
    pub payload: Value,
}

impl InboundMessage {
    /// Parses one text frame.
    ///
    /// - `Err(Deserialization)`: the frame is not JSON
    /// - `Ok(None)`: valid JSON without a string `type` (not routable)
    /// - `Ok(Some(_))`: routable message
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| RealtimeError::Deserialization(e.to_string()))?;
        Ok(Self::from_value(value))
    }

    /// Splits an already-parsed JSON value into routing key and payload.
    pub fn from_value(mut value: Value) -> Option<Self> {
        let message_type = value.get("type")?.as_str()?.to_string();

        let data = value
            .as_object_mut()
            .and_then(|obj| obj.remove("data"))
            .filter(|data| !data.is_null());

        let payload = match data {
            Some(data) => data,
            None => value,
        };

        Some(Self {
            message_type,
            payload,
        })
    }

    /// Decodes the payload into a concrete type.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| RealtimeError::Deserialization(e.to_string()))
    }
}

/// Frames the client itself sends to manage the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlFrame {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    Ping,
}

impl ControlFrame {
    pub fn subscribe(topic: impl Into<String>) -> Self {
        ControlFrame::Subscribe {
            topic: topic.into(),
        }
    }

    pub fn unsubscribe(topic: impl Into<String>) -> Self {
        ControlFrame::Unsubscribe {
            topic: topic.into(),
        }
    }

    pub fn to_text(&self) -> Result<String> {
        encode(self)
    }
}

/// Serializes any outbound value to a JSON text frame.
pub fn encode<T: Serialize + ?Sized>(data: &T) -> Result<String> {
    serde_json::to_string(data).map_err(|e| RealtimeError::Serialization(e.to_string()))
}
