//! Observable client-side state for opencode sessions.
//!
//! [`SessionStore`] holds the session list, the current selection, and per-session
//! message history behind one watch channel. It can own the server event
//! subscription and fold incoming events into that state via [`apply_event`].

mod error;
mod reconcile;
mod store;

pub use error::SessionStoreError;
pub use reconcile::{
    apply_event, Reconciled, EVENT_MESSAGE_UPDATED, EVENT_SESSION_CREATED,
    EVENT_SESSION_DELETED, EVENT_SESSION_STATUS, EVENT_SESSION_UPDATED,
};
pub use store::{EventPump, SessionStore, StoreState};
