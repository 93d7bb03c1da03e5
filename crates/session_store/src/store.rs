use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use opencode_api::{
    ApiError, Message, OpencodeClient, ServerEvent, Session, SessionStatus, SubscriptionHandle,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::SessionStoreError;
use crate::reconcile::apply_event;

/// Everything observers can see, published as one snapshot per mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreState {
    pub sessions: Vec<Session>,
    pub current_session: Option<Session>,
    pub messages: HashMap<String, Vec<Message>>,
}

impl StoreState {
    pub fn messages(&self, session_id: &str) -> &[Message] {
        self.messages
            .get(session_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn is_current(&self, session_id: &str) -> bool {
        self.current_session
            .as_ref()
            .is_some_and(|current| current.id == session_id)
    }

    /// Insert or replace by id, keeping position, and refresh current.
    fn upsert_session(&mut self, session: Session) {
        if self.is_current(&session.id) {
            self.current_session = Some(session.clone());
        }
        match self.sessions.iter_mut().find(|entry| entry.id == session.id) {
            Some(entry) => *entry = session,
            None => self.sessions.push(session),
        }
    }
}

/// Single source of truth for sessions, the current selection, and per-session
/// message history. Shared as `Arc<SessionStore>`.
#[derive(Debug)]
pub struct SessionStore {
    state: watch::Sender<StoreState>,
    subscription: Mutex<Option<SubscriptionHandle>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(StoreState::default());
        Self {
            state,
            subscription: Mutex::new(None),
        }
    }

    /// Observe snapshots. The receiver starts at the current state.
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.borrow().clone()
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.state.borrow().sessions.clone()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.state.borrow().current_session.clone()
    }

    /// Messages of one session; empty when none are loaded.
    pub fn messages(&self, session_id: &str) -> Vec<Message> {
        self.state.borrow().messages(session_id).to_vec()
    }

    /// Replace the list wholesale.
    ///
    /// Duplicate ids collapse to the last entry at the first position. The current
    /// session is refreshed from the new list, or cleared when the list lacks it.
    pub fn set_sessions(&self, sessions: Vec<Session>) {
        self.state.send_modify(|state| {
            let current = state.current_session.take();
            state.sessions.clear();
            for session in sessions {
                state.upsert_session(session);
            }
            state.current_session = current.and_then(|current| {
                state
                    .sessions
                    .iter()
                    .find(|session| session.id == current.id)
                    .cloned()
            });
        });
    }

    /// Insert a session, or replace the entry with the same id in place.
    ///
    /// A replaced session that is also current is refreshed in the same snapshot.
    pub fn add_session(&self, session: Session) {
        self.state.send_modify(|state| state.upsert_session(session));
    }

    /// Returns whether anything changed.
    pub fn remove_session(&self, session_id: &str) -> bool {
        self.state.send_if_modified(|state| {
            let before = state.sessions.len();
            state.sessions.retain(|session| session.id != session_id);
            let mut modified = state.sessions.len() != before;
            if state.is_current(session_id) {
                state.current_session = None;
                modified = true;
            }
            modified
        })
    }

    /// Select a session. One missing from the list is upserted into it first.
    pub fn set_current_session(&self, session: Option<Session>) {
        self.state.send_modify(|state| match session {
            Some(session) => {
                state.current_session = Some(session.clone());
                state.upsert_session(session);
            }
            None => state.current_session = None,
        });
    }

    /// Update the status in the list and the current slot together. An unknown id
    /// leaves the store untouched and notifies no one.
    pub fn update_session_status(&self, session_id: &str, status: SessionStatus) -> bool {
        self.state.send_if_modified(|state| {
            let mut found = false;
            if let Some(entry) = state
                .sessions
                .iter_mut()
                .find(|session| session.id == session_id)
            {
                entry.status = status;
                found = true;
            }
            if let Some(current) = state
                .current_session
                .as_mut()
                .filter(|current| current.id == session_id)
            {
                current.status = status;
                found = true;
            }
            found
        })
    }

    pub fn add_message(&self, session_id: &str, message: Message) {
        self.state.send_modify(|state| {
            state
                .messages
                .entry(session_id.to_owned())
                .or_default()
                .push(message);
        });
    }

    pub fn set_messages(&self, session_id: &str, messages: Vec<Message>) {
        self.state.send_modify(|state| {
            state.messages.insert(session_id.to_owned(), messages);
        });
    }

    /// Replace the message with the same id in place, or append it. Messages
    /// without an id are always appended.
    pub fn upsert_message(&self, session_id: &str, message: Message) {
        self.state.send_modify(|state| {
            let messages = state.messages.entry(session_id.to_owned()).or_default();
            let existing = messages
                .iter_mut()
                .filter(|_| !message.id().is_empty())
                .find(|entry| entry.id() == message.id());
            match existing {
                Some(entry) => *entry = message,
                None => messages.push(message),
            }
        });
    }

    pub fn clear_messages(&self, session_id: &str) -> bool {
        self.state
            .send_if_modified(|state| state.messages.remove(session_id).is_some())
    }

    /// Reset every slot and drop the event subscription.
    pub fn clear(&self) {
        self.disconnect_event_stream();
        self.state.send_replace(StoreState::default());
    }

    /// Subscribe to the server event stream and keep the store reconciled with it.
    ///
    /// Any previous subscription is cancelled before the new one opens. Each event
    /// is applied to the store and then handed to `on_event`. A stream failure is
    /// reported to `on_error` only and leaves loaded state in place.
    pub fn connect_event_stream<E, F>(
        self: &Arc<Self>,
        client: &OpencodeClient,
        mut on_event: E,
        on_error: F,
    ) -> Result<EventPump, SessionStoreError>
    where
        E: FnMut(ServerEvent) + Send + 'static,
        F: FnOnce(ApiError) + Send + 'static,
    {
        tokio::runtime::Handle::try_current().map_err(|_| SessionStoreError::NoRuntime)?;

        let mut slot = self.lock_subscription();
        if let Some(previous) = slot.take() {
            previous.cancel();
        }

        let subscription = client.subscribe_events();
        let handle = subscription.handle();
        *slot = Some(handle.clone());
        drop(slot);

        let store: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            subscription
                .run_with_handlers(
                    move |event| {
                        if let Some(store) = store.upgrade() {
                            if let Err(error) = apply_event(&store, &event) {
                                tracing::warn!(%error, "event not applied to session store");
                            }
                        }
                        on_event(event);
                    },
                    on_error,
                )
                .await;
        });

        Ok(EventPump { handle, task })
    }

    /// Cancel the live subscription, if any. Idempotent.
    pub fn disconnect_event_stream(&self) {
        if let Some(handle) = self.lock_subscription().take() {
            handle.cancel();
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.lock_subscription()
            .as_ref()
            .is_some_and(|handle| !handle.is_cancelled())
    }

    fn lock_subscription(&self) -> std::sync::MutexGuard<'_, Option<SubscriptionHandle>> {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.disconnect_event_stream();
    }
}

/// The task feeding one subscription into the store.
#[derive(Debug)]
pub struct EventPump {
    handle: SubscriptionHandle,
    task: JoinHandle<()>,
}

impl EventPump {
    pub fn handle(&self) -> &SubscriptionHandle {
        &self.handle
    }

    /// Wait until the stream fails or is cancelled.
    ///
    /// A panic raised by the event callback is resumed here.
    pub async fn finished(self) {
        match self.task.await {
            Ok(()) => {}
            Err(error) if error.is_panic() => {
                tracing::error!("event pump panicked");
                std::panic::resume_unwind(error.into_panic());
            }
            Err(error) => tracing::debug!(%error, "event pump stopped"),
        }
    }
}
