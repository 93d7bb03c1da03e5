use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use opencode_api::events::EVENT_SERVER_CONNECTED;
use opencode_api::{
    ApiError, Message, Method, OpencodeClient, OpencodeConfig, ServerEvent, ServerHealth,
    Session, SessionStatus,
};
use session_store::{EventPump, SessionStore, SessionStoreError};
use thiserror::Error;

use crate::reconnect::ReconnectPolicy;

/// Title given to the session created when a server has none.
pub const DEFAULT_SESSION_TITLE: &str = "Mobile Session";
/// History loaded when a session is selected.
pub const MESSAGE_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] SessionStoreError),

    #[error("server at {base_url} is not healthy (version {version})")]
    Unhealthy { base_url: String, version: String },

    #[error("no session is selected")]
    NoCurrentSession,

    #[error("message is empty")]
    EmptyMessage,

    #[error("event stream failed after {attempts} reconnect attempts: {source}")]
    StreamExhausted {
        attempts: u32,
        #[source]
        source: ApiError,
    },
}

/// Client and store wired together the way an app screen drives them.
#[derive(Debug, Clone)]
pub struct SessionSync {
    client: Arc<OpencodeClient>,
    store: Arc<SessionStore>,
}

impl SessionSync {
    pub fn new(config: OpencodeConfig) -> Result<Self, SyncError> {
        let client = OpencodeClient::new(config)?;
        Ok(Self::from_parts(Arc::new(client), Arc::new(SessionStore::new())))
    }

    pub fn from_parts(client: Arc<OpencodeClient>, store: Arc<SessionStore>) -> Self {
        Self { client, store }
    }

    pub fn client(&self) -> &Arc<OpencodeClient> {
        &self.client
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Check health, load sessions, and make sure one is selected.
    ///
    /// The first listed session becomes current; with none listed, a new
    /// [`DEFAULT_SESSION_TITLE`] session is created.
    pub async fn connect(&self) -> Result<ServerHealth, SyncError> {
        let health = self.client.check_health().await?;
        if !health.healthy {
            return Err(SyncError::Unhealthy {
                base_url: self.client.transport().base_url().to_owned(),
                version: health.version,
            });
        }
        tracing::info!(
            base_url = self.client.transport().base_url(),
            version = %health.version,
            "connected to opencode server"
        );

        let sessions = self.refresh_sessions().await?;
        match sessions.into_iter().next() {
            Some(first) => self.store.set_current_session(Some(first)),
            None => {
                self.create_session(Some(DEFAULT_SESSION_TITLE)).await?;
            }
        }

        Ok(health)
    }

    pub async fn refresh_sessions(&self) -> Result<Vec<Session>, SyncError> {
        let sessions = self.client.list_sessions().await?;
        self.store.set_sessions(sessions.clone());
        Ok(sessions)
    }

    /// Create a session remotely and make it current.
    pub async fn create_session(&self, title: Option<&str>) -> Result<Session, SyncError> {
        let session = self.client.create_session(title, None).await?;
        self.store.add_session(session.clone());
        self.store.set_current_session(Some(session.clone()));
        Ok(session)
    }

    /// Make a session current and load its recent history.
    pub async fn select_session(&self, session_id: &str) -> Result<Session, SyncError> {
        let known = self
            .store
            .sessions()
            .into_iter()
            .find(|session| session.id == session_id);
        let session = match known {
            Some(session) => session,
            None => self.client.get_session(session_id).await?,
        };
        self.store.set_current_session(Some(session.clone()));

        let messages = self
            .client
            .list_messages(session_id, Some(MESSAGE_PAGE_LIMIT))
            .await?;
        self.store.set_messages(session_id, messages);
        Ok(session)
    }

    /// Send to the current session and record the reply.
    pub async fn send_message(&self, content: &str) -> Result<Message, SyncError> {
        let (session_id, content) = self.prompt_target(content)?;
        let message = self
            .client
            .send_message(&session_id, content, None, None, None)
            .await?;
        self.store.upsert_message(&session_id, message.clone());
        Ok(message)
    }

    /// Queue a prompt on the current session; the reply arrives as events.
    pub async fn send_message_async(&self, content: &str) -> Result<bool, SyncError> {
        let (session_id, content) = self.prompt_target(content)?;
        Ok(self.client.send_message_async(&session_id, content).await)
    }

    /// Delete remotely; the local copy goes only once the server agreed.
    pub async fn delete_session(&self, session_id: &str) -> bool {
        let deleted = self.client.delete_session(session_id).await;
        if deleted {
            self.store.remove_session(session_id);
            self.store.clear_messages(session_id);
        }
        deleted
    }

    pub async fn abort_current(&self) -> Result<bool, SyncError> {
        let session = self
            .store
            .current_session()
            .ok_or(SyncError::NoCurrentSession)?;
        let aborted = self.client.abort_session(&session.id).await;
        if aborted {
            self.store.update_session_status(&session.id, SessionStatus::Aborted);
        }
        Ok(aborted)
    }

    /// Open the event stream once, without reconnecting.
    pub fn start_events<E, F>(&self, on_event: E, on_error: F) -> Result<EventPump, SyncError>
    where
        E: FnMut(ServerEvent) + Send + 'static,
        F: FnOnce(ApiError) + Send + 'static,
    {
        Ok(self
            .store
            .connect_event_stream(&self.client, on_event, on_error)?)
    }

    /// Keep the event stream open, reconnecting after failures per `policy`.
    ///
    /// Returns `Ok(())` once the stream is disconnected by the caller. Gives up with
    /// [`SyncError::StreamExhausted`] when the policy runs out, or immediately with
    /// [`SyncError::Api`] on a failure retrying cannot fix. A stream that opened
    /// resets the attempt count.
    pub async fn run_events_with_reconnect<E>(
        &self,
        policy: ReconnectPolicy,
        on_event: E,
    ) -> Result<(), SyncError>
    where
        E: FnMut(ServerEvent) + Send + 'static,
    {
        let on_event = Arc::new(Mutex::new(on_event));
        let mut attempt = 0;

        loop {
            let opened = Arc::new(AtomicBool::new(false));
            let failure = Arc::new(Mutex::new(None::<ApiError>));

            let pump = self.start_events(
                {
                    let on_event = Arc::clone(&on_event);
                    let opened = Arc::clone(&opened);
                    move |event: ServerEvent| {
                        if event.is(EVENT_SERVER_CONNECTED) {
                            opened.store(true, Ordering::Release);
                        }
                        let mut on_event =
                            on_event.lock().unwrap_or_else(PoisonError::into_inner);
                        (*on_event)(event);
                    }
                },
                {
                    let failure = Arc::clone(&failure);
                    move |error| {
                        *failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
                    }
                },
            )?;
            let handle = pump.handle().clone();
            pump.finished().await;

            let error = failure
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            let Some(error) = error else {
                return Ok(());
            };

            if opened.load(Ordering::Acquire) {
                attempt = 0;
            }
            if !error.is_retryable(&Method::GET) {
                return Err(SyncError::Api(error));
            }
            let Some(delay) = policy.delay(attempt) else {
                return Err(SyncError::StreamExhausted {
                    attempts: attempt,
                    source: error,
                });
            };

            tracing::warn!(
                %error,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "event stream failed; reconnecting"
            );
            tokio::time::sleep(delay).await;
            if handle.is_cancelled() {
                return Ok(());
            }
            attempt += 1;
        }
    }

    /// Drop the event stream and all loaded state.
    pub fn disconnect(&self) {
        self.store.clear();
    }

    fn prompt_target<'a>(&self, content: &'a str) -> Result<(String, &'a str), SyncError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(SyncError::EmptyMessage);
        }
        let session = self
            .store
            .current_session()
            .ok_or(SyncError::NoCurrentSession)?;
        Ok((session.id, content))
    }
}
