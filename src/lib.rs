//! Client-side session sync for opencode servers.
//!
//! - [`opencode_api`] talks to the server: REST operations and the event stream.
//! - [`session_store`] holds observable session, selection, and message state.
//! - [`SessionSync`] wires the two together and adds an explicit reconnect loop.
//!
//! Ambient concerns live here too: environment configuration ([`config`]),
//! `tracing` setup ([`logging`]), and saved connection preferences ([`prefs`]).

pub mod config;
pub mod logging;
pub mod prefs;
pub mod reconnect;
pub mod sync;

pub use opencode_api;
pub use session_store;

pub use config::EnvConfig;
pub use logging::{init_logging, LoggingError};
pub use prefs::{ConnectionPrefs, PrefsError};
pub use reconnect::ReconnectPolicy;
pub use sync::{SessionSync, SyncError, DEFAULT_SESSION_TITLE, MESSAGE_PAGE_LIMIT};
