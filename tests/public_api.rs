#![allow(unused_imports)]

use opencode_sync::opencode_api::{
    normalize_base_url, with_cancellation, ApiError, CancellationSignal, Command,
    CommandArgument, Decode, EventSubscription, FileContent, FileDiff, FileNode, Message,
    MessageInfo, MessagePart, MessageRole, Method, OpencodeClient, OpencodeConfig, Project,
    PromptRequest, Provider, SearchResult, ServerEvent, ServerHealth, Session, SessionStatus,
    SseStreamParser, StatusCode, StreamMessage, SubscriptionHandle, SubscriptionState, Transport,
};
use opencode_sync::session_store::{
    apply_event, EventPump, Reconciled, SessionStore, SessionStoreError, StoreState,
};
use opencode_sync::{
    init_logging, ConnectionPrefs, EnvConfig, LoggingError, PrefsError, ReconnectPolicy,
    SessionSync, SyncError, DEFAULT_SESSION_TITLE, MESSAGE_PAGE_LIMIT,
};

#[test]
fn public_api_exports_compile() {}
