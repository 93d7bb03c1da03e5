//! Policy mapping server events onto store mutations.

use opencode_api::events::{EVENT_DEFAULT, EVENT_RAW, EVENT_SERVER_CONNECTED};
use opencode_api::{Decode, Message, ServerEvent, Session, SessionStatus};
use serde_json::Value;

use crate::error::SessionStoreError;
use crate::store::SessionStore;

pub const EVENT_SESSION_STATUS: &str = "session.status";
pub const EVENT_SESSION_CREATED: &str = "session.created";
pub const EVENT_SESSION_UPDATED: &str = "session.updated";
pub const EVENT_SESSION_DELETED: &str = "session.deleted";
pub const EVENT_MESSAGE_UPDATED: &str = "message.updated";

/// What an event did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// `changed` is false when the session is not in the store.
    Status {
        session_id: String,
        status: SessionStatus,
        changed: bool,
    },
    Message {
        session_id: String,
        message_id: String,
    },
    Session(String),
    Removed(String),
    Ignored,
}

/// Apply one event. Unknown event types are ignored, never errors.
pub fn apply_event(
    store: &SessionStore,
    event: &ServerEvent,
) -> Result<Reconciled, SessionStoreError> {
    match event.event_type.as_str() {
        EVENT_SESSION_STATUS => apply_status(store, event),
        EVENT_DEFAULT | EVENT_MESSAGE_UPDATED => apply_message(store, event),
        EVENT_SESSION_CREATED | EVENT_SESSION_UPDATED => apply_session(store, event),
        EVENT_SESSION_DELETED => apply_deleted(store, event),
        EVENT_SERVER_CONNECTED | EVENT_RAW => Ok(Reconciled::Ignored),
        other => {
            tracing::trace!(event_type = other, "ignoring event");
            Ok(Reconciled::Ignored)
        }
    }
}

fn apply_status(
    store: &SessionStore,
    event: &ServerEvent,
) -> Result<Reconciled, SessionStoreError> {
    let session_id = event_session_id(&event.data)
        .ok_or_else(|| SessionStoreError::missing_session(&event.event_type))?;
    let status = SessionStatus::from_value(event.data.get("status"));
    let changed = store.update_session_status(session_id, status);

    Ok(Reconciled::Status {
        session_id: session_id.to_owned(),
        status,
        changed,
    })
}

fn apply_message(
    store: &SessionStore,
    event: &ServerEvent,
) -> Result<Reconciled, SessionStoreError> {
    let body = event
        .data
        .get("message")
        .filter(|value| value.is_object())
        .unwrap_or(&event.data);
    let mut message = Message::decode(body)
        .map_err(|source| SessionStoreError::undecodable(&event.event_type, source))?;

    let session_id = event_session_id(&event.data)
        .or_else(|| event_session_id(body))
        .map(ToOwned::to_owned)
        .or_else(|| Some(message.info.session_id.clone()).filter(|id| !id.is_empty()))
        .ok_or_else(|| SessionStoreError::missing_session(&event.event_type))?;

    // Info-only updates keep the parts already loaded for that message.
    if body.get("parts").is_none() {
        if let Some(existing) = store
            .messages(&session_id)
            .into_iter()
            .find(|existing| existing.id() == message.id())
        {
            message.parts = existing.parts;
        }
    }

    let message_id = message.id().to_owned();
    store.upsert_message(&session_id, message);
    Ok(Reconciled::Message {
        session_id,
        message_id,
    })
}

fn apply_session(
    store: &SessionStore,
    event: &ServerEvent,
) -> Result<Reconciled, SessionStoreError> {
    let session = Session::decode(session_body(&event.data))
        .map_err(|source| SessionStoreError::undecodable(&event.event_type, source))?;
    if session.id.is_empty() {
        return Err(SessionStoreError::missing_session(&event.event_type));
    }

    let id = session.id.clone();
    store.add_session(session);
    Ok(Reconciled::Session(id))
}

fn apply_deleted(
    store: &SessionStore,
    event: &ServerEvent,
) -> Result<Reconciled, SessionStoreError> {
    let session_id = session_body(&event.data)
        .get("id")
        .and_then(Value::as_str)
        .or_else(|| event_session_id(&event.data))
        .filter(|id| !id.is_empty())
        .ok_or_else(|| SessionStoreError::missing_session(&event.event_type))?;

    store.remove_session(session_id);
    Ok(Reconciled::Removed(session_id.to_owned()))
}

fn event_session_id(data: &Value) -> Option<&str> {
    data.get("sessionID")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

fn session_body(data: &Value) -> &Value {
    data.get("info")
        .filter(|value| value.is_object())
        .unwrap_or(data)
}

#[cfg(test)]
mod tests {
    use opencode_api::{Message, MessagePart, ServerEvent, SessionStatus};
    use serde_json::json;

    use super::{apply_event, Reconciled};
    use crate::{SessionStore, StoreState};

    fn session_json(id: &str) -> serde_json::Value {
        json!({"id": id, "title": id, "createdAt": 1, "updatedAt": 1})
    }

    #[test]
    fn message_payload_session_wins_over_info() {
        let store = SessionStore::new();
        let event = ServerEvent::new(
            "message",
            json!({
                "sessionID": "s2",
                "info": {"id": "m1", "sessionID": "s1", "role": "assistant"},
                "parts": [{"type": "text", "text": "hello"}],
            }),
        );

        let outcome = apply_event(&store, &event).expect("applied");
        assert_eq!(
            outcome,
            Reconciled::Message {
                session_id: "s2".to_owned(),
                message_id: "m1".to_owned(),
            }
        );
        assert!(store.messages("s1").is_empty());
        assert_eq!(store.messages("s2")[0].text_content(), "hello");
    }

    #[test]
    fn info_only_update_keeps_loaded_parts() {
        let store = SessionStore::new();
        let original: Message = opencode_api::models::decode_str(
            r#"{"info":{"id":"m1","sessionID":"s1"},"parts":[{"type":"text","text":"draft"}]}"#,
        )
        .expect("message");
        store.add_message("s1", original);

        let event = ServerEvent::new(
            "message.updated",
            json!({"info": {"id": "m1", "sessionID": "s1", "role": "assistant"}}),
        );
        apply_event(&store, &event).expect("applied");

        let messages = store.messages("s1");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].parts, vec![MessagePart::text("draft")]);
        assert_eq!(messages[0].info.role, opencode_api::MessageRole::Assistant);
    }

    #[test]
    fn undecodable_message_is_an_error_and_leaves_store() {
        let store = SessionStore::new();
        let event = ServerEvent::new("message", json!({"parts": []}));

        assert!(apply_event(&store, &event).is_err());
        assert_eq!(store.snapshot(), StoreState::default());
    }

    #[test]
    fn session_events_upsert_and_remove() {
        let store = SessionStore::new();
        let created = ServerEvent::new("session.created", json!({"info": session_json("s1")}));
        apply_event(&store, &created).expect("created");
        store.set_current_session(store.sessions().first().cloned());

        let mut renamed = session_json("s1");
        renamed["title"] = json!("Renamed");
        apply_event(
            &store,
            &ServerEvent::new("session.updated", json!({"info": renamed})),
        )
        .expect("updated");

        assert_eq!(store.sessions().len(), 1);
        assert_eq!(
            store.current_session().map(|session| session.title),
            Some("Renamed".to_owned())
        );

        apply_event(
            &store,
            &ServerEvent::new("session.deleted", json!({"info": session_json("s1")})),
        )
        .expect("deleted");
        assert!(store.sessions().is_empty());
        assert!(store.current_session().is_none());
    }

    #[test]
    fn status_for_unknown_session_reports_unchanged() {
        let store = SessionStore::new();
        let event = ServerEvent::new(
            "session.status",
            json!({"sessionID": "ghost", "status": {"type": "busy"}}),
        );

        let outcome = apply_event(&store, &event).expect("applied");
        assert_eq!(
            outcome,
            Reconciled::Status {
                session_id: "ghost".to_owned(),
                status: SessionStatus::Running,
                changed: false,
            }
        );
    }

    #[test]
    fn unknown_and_synthetic_events_are_ignored() {
        let store = SessionStore::new();
        for event in [
            ServerEvent::connected(),
            ServerEvent::raw("garbage"),
            ServerEvent::new("lsp.updated", json!({"anything": true})),
        ] {
            assert_eq!(apply_event(&store, &event).expect("ignored"), Reconciled::Ignored);
        }
    }
}
