use opencode_api::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("event stream requires a running tokio runtime")]
    NoRuntime,

    #[error("could not decode '{event_type}' event: {source}")]
    UndecodableEvent {
        event_type: String,
        #[source]
        source: ApiError,
    },

    #[error("'{event_type}' event does not name a session")]
    MissingSessionId { event_type: String },
}

impl SessionStoreError {
    pub(crate) fn undecodable(event_type: &str, source: ApiError) -> Self {
        Self::UndecodableEvent {
            event_type: event_type.to_owned(),
            source,
        }
    }

    pub(crate) fn missing_session(event_type: &str) -> Self {
        Self::MissingSessionId {
            event_type: event_type.to_owned(),
        }
    }
}
