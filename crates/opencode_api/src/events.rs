use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ApiError;

/// Synthetic event yielded once the stream is open.
pub const EVENT_SERVER_CONNECTED: &str = "server.connected";
/// Frames whose data is not JSON are delivered under this type.
pub const EVENT_RAW: &str = "raw";
/// Type used when a frame names none.
pub const EVENT_DEFAULT: &str = "message";

/// One server-pushed notification. Transient: consumed during dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Value,
}

impl ServerEvent {
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }

    pub fn connected() -> Self {
        Self::new(EVENT_SERVER_CONNECTED, json!({}))
    }

    /// Wrap unparseable frame text so it is still delivered.
    pub fn raw(text: impl Into<String>) -> Self {
        Self::new(EVENT_RAW, json!({ "data": text.into() }))
    }

    pub fn is(&self, event_type: &str) -> bool {
        self.event_type == event_type
    }

    /// String field of the event data.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

/// Lifecycle of one event-stream subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Disconnected,
    Connecting,
    Open,
    /// Transport failure or server close. Reconnecting is the caller's decision.
    Failed,
}

/// Item yielded by an event subscription.
#[derive(Debug)]
pub enum StreamMessage {
    Event(ServerEvent),
    /// Terminal: nothing follows a failure.
    Failed(ApiError),
}
