//! Client primitives for an opencode server.
//!
//! This crate owns the authenticated HTTP transport, the wire codec for domain
//! entities, the typed operation surface, and the server event-stream subscription.
//! It holds no application state; see the `session_store` crate for that.
//!
//! Event frames are normalized into [`ServerEvent`] values. Frames whose data is not
//! JSON are still delivered as `raw` events rather than dropped.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod models;
pub mod payload;
pub mod retry;
pub mod sse;
pub mod stream;
#[cfg(feature = "test-support")]
pub mod testing;
pub mod transport;
pub mod url;

pub use client::{with_cancellation, CancellationSignal, OpencodeClient};
pub use config::OpencodeConfig;
pub use error::ApiError;
pub use events::{ServerEvent, StreamMessage, SubscriptionState};
pub use models::{
    Command, CommandArgument, Decode, FileContent, FileDiff, FileNode, Message, MessageInfo,
    MessagePart, MessageRole, Project, Provider, SearchResult, ServerHealth, Session,
    SessionStatus,
};
pub use payload::PromptRequest;
pub use reqwest::{Method, StatusCode};
pub use sse::SseStreamParser;
pub use stream::{EventSubscription, SubscriptionHandle};
pub use transport::Transport;
pub use url::normalize_base_url;
