use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::config::OpencodeConfig;
use crate::error::ApiError;
use crate::models::{
    decode_provider_catalog, decode_str, Command, Decode, FileContent, FileDiff, FileNode,
    Message, Project, Provider, SearchResult, ServerHealth, Session,
};
use crate::payload::{
    CommandRequest, CreateSessionRequest, ForkSessionRequest, PromptRequest, ProviderCredentials,
    ShellRequest,
};
use crate::stream::EventSubscription;
use crate::transport::Transport;
use crate::url::{encode_component, session_path, with_query};

/// Optional cancellation signal shared across a request and its caller.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Typed operation surface of an opencode server.
///
/// Every method is one request/response cycle with no retry. Dropping a returned
/// future cancels its request; [`with_cancellation`] adds flag-based cancellation.
#[derive(Debug, Clone)]
pub struct OpencodeClient {
    transport: Transport,
}

impl OpencodeClient {
    pub fn new(config: OpencodeConfig) -> Result<Self, ApiError> {
        Ok(Self {
            transport: Transport::new(config)?,
        })
    }

    pub fn config(&self) -> &OpencodeConfig {
        self.transport.config()
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    // Global

    /// Reachable-but-unhealthy servers yield `healthy: false`, not an error.
    pub async fn check_health(&self) -> Result<ServerHealth, ApiError> {
        self.get("/global/health").await
    }

    /// Open the server event stream. Must be called inside a tokio runtime.
    pub fn subscribe_events(&self) -> EventSubscription {
        EventSubscription::spawn(self.transport.clone())
    }

    // Projects

    pub async fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        self.get("/project").await
    }

    pub async fn current_project(&self) -> Result<Project, ApiError> {
        self.get("/project/current").await
    }

    // Sessions

    pub async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
        self.get("/session").await
    }

    pub async fn create_session(
        &self,
        title: Option<&str>,
        parent_id: Option<&str>,
    ) -> Result<Session, ApiError> {
        let body = CreateSessionRequest {
            title: title.map(ToOwned::to_owned),
            parent_id: parent_id.map(ToOwned::to_owned),
        };
        self.send(Method::POST, "/session", Some(&body)).await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Session, ApiError> {
        self.get(&session_path(session_id, None)).await
    }

    /// `false` on any failure; deleting is non-fatal to callers.
    pub async fn delete_session(&self, session_id: &str) -> bool {
        let path = session_path(session_id, None);
        self.succeeds(Method::DELETE, &path, None::<&Value>).await
    }

    pub async fn fork_session(
        &self,
        session_id: &str,
        message_id: Option<&str>,
    ) -> Result<Session, ApiError> {
        let body = ForkSessionRequest {
            message_id: message_id.map(ToOwned::to_owned),
        };
        self.send(Method::POST, &session_path(session_id, Some("fork")), Some(&body))
            .await
    }

    pub async fn abort_session(&self, session_id: &str) -> bool {
        let path = session_path(session_id, Some("abort"));
        self.succeeds(Method::POST, &path, None::<&Value>).await
    }

    // Messages

    pub async fn list_messages(
        &self,
        session_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Message>, ApiError> {
        let limit = limit.map(|limit| limit.to_string());
        let path = with_query(
            &session_path(session_id, Some("message")),
            &[("limit", limit.as_deref())],
        );
        self.get(&path).await
    }

    /// Blocks until the server returns the complete assistant message.
    pub async fn send_message(
        &self,
        session_id: &str,
        content: &str,
        model: Option<&str>,
        agent: Option<&str>,
        system: Option<&str>,
    ) -> Result<Message, ApiError> {
        let body = PromptRequest::text(content)
            .with_model(model.map(ToOwned::to_owned))
            .with_agent(agent.map(ToOwned::to_owned))
            .with_system(system.map(ToOwned::to_owned));
        self.send(
            Method::POST,
            &session_path(session_id, Some("message")),
            Some(&body),
        )
        .await
    }

    /// Fire-and-forget prompt; the reply arrives through the event stream.
    pub async fn send_message_async(&self, session_id: &str, content: &str) -> bool {
        let body = PromptRequest::text(content);
        let path = session_path(session_id, Some("prompt_async"));
        self.succeeds(Method::POST, &path, Some(&body)).await
    }

    pub async fn execute_command(
        &self,
        session_id: &str,
        command: &str,
        arguments: &[String],
    ) -> Result<Message, ApiError> {
        let body = CommandRequest {
            command: command.to_owned(),
            arguments: arguments.to_vec(),
        };
        self.send(
            Method::POST,
            &session_path(session_id, Some("command")),
            Some(&body),
        )
        .await
    }

    pub async fn execute_shell(
        &self,
        session_id: &str,
        command: &str,
        agent: Option<&str>,
    ) -> Result<Message, ApiError> {
        let body = ShellRequest {
            command: command.to_owned(),
            agent: agent.map(ToOwned::to_owned),
        };
        self.send(
            Method::POST,
            &session_path(session_id, Some("shell")),
            Some(&body),
        )
        .await
    }

    // Files

    pub async fn list_files(&self, path: &str) -> Result<Vec<FileNode>, ApiError> {
        self.get(&with_query("/file", &[("path", Some(path))])).await
    }

    pub async fn read_file(&self, path: &str) -> Result<FileContent, ApiError> {
        let body = self
            .transport
            .request(
                Method::GET,
                &with_query("/file/content", &[("path", Some(path))]),
                None,
            )
            .await?;
        let value = serde_json::from_str::<Value>(&body)?;
        FileContent::decode_for(&value, path)
    }

    pub async fn search_in_files(&self, pattern: &str) -> Result<Vec<SearchResult>, ApiError> {
        self.get(&with_query("/find", &[("pattern", Some(pattern))]))
            .await
    }

    pub async fn find_files(&self, query: &str) -> Result<Vec<String>, ApiError> {
        self.get(&with_query("/find/file", &[("query", Some(query))]))
            .await
    }

    pub async fn get_diff(&self, session_id: &str) -> Result<Vec<FileDiff>, ApiError> {
        self.get(&session_path(session_id, Some("diff"))).await
    }

    // Providers and commands

    pub async fn list_providers(&self) -> Result<Vec<Provider>, ApiError> {
        let body = self.transport.request(Method::GET, "/provider", None).await?;
        let value = serde_json::from_str::<Value>(&body)?;
        decode_provider_catalog(&value)
    }

    pub async fn set_provider_auth(
        &self,
        provider_id: &str,
        credentials: &ProviderCredentials,
    ) -> bool {
        let path = format!("/auth/{}", encode_component(provider_id));
        self.succeeds(Method::PUT, &path, Some(credentials)).await
    }

    pub async fn list_commands(&self) -> Result<Vec<Command>, ApiError> {
        self.get("/command").await
    }

    async fn get<T: Decode>(&self, path: &str) -> Result<T, ApiError> {
        let body = self.transport.request(Method::GET, path, None).await?;
        decode_str(&body)
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        B: Serialize,
        T: Decode,
    {
        let body = body.map(serde_json::to_value).transpose()?;
        let response = self.transport.request(method, path, body.as_ref()).await?;
        decode_str(&response)
    }

    async fn succeeds<B: Serialize>(&self, method: Method, path: &str, body: Option<&B>) -> bool {
        let body = match body.map(serde_json::to_value).transpose() {
            Ok(body) => body,
            Err(error) => {
                tracing::warn!(%method, path, %error, "request body failed to serialize");
                return false;
            }
        };

        match self.transport.request(method.clone(), path, body.as_ref()).await {
            Ok(_) => true,
            Err(error) => {
                tracing::warn!(%method, path, %error, "opencode operation failed");
                false
            }
        }
    }
}

/// Race `future` against a shared cancellation flag.
///
/// Once the flag is set the future is dropped, which aborts its request, and
/// [`ApiError::Cancelled`] is returned.
pub async fn with_cancellation<F, T>(
    future: F,
    cancellation: &CancellationSignal,
) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    await_or_cancel(future, Some(cancellation)).await?
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, ApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(ApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(ApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::{with_cancellation, CancellationSignal};
    use crate::error::ApiError;

    #[tokio::test]
    async fn cancelled_flag_short_circuits() {
        let signal = CancellationSignal::default();
        signal.store(true, Ordering::Release);

        let result: Result<(), ApiError> =
            with_cancellation(std::future::pending(), &signal).await;
        assert!(result.expect_err("cancelled").is_cancelled());
    }

    #[tokio::test]
    async fn completed_future_passes_through() {
        let signal = CancellationSignal::default();
        let result = with_cancellation(async { Ok::<_, ApiError>(7) }, &signal).await;
        assert_eq!(result.expect("value"), 7);
    }
}
