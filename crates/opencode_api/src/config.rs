use std::collections::BTreeMap;
use std::time::Duration;

use crate::url::DEFAULT_SERVER_URL;

/// Username the server expects when none is configured.
pub const DEFAULT_USERNAME: &str = "opencode";
/// Connect timeout applied to every request, streaming included.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Read timeout for REST calls. The event stream has none.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);
/// Bound on sending a REST request body.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport configuration for an opencode server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpencodeConfig {
    /// Server origin, e.g. `http://192.168.1.10:4096`.
    pub base_url: String,
    /// Basic-auth username.
    pub username: String,
    /// Basic-auth password. May be empty.
    pub password: String,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Additional headers merged into request headers.
    pub extra_headers: BTreeMap<String, String>,
    pub connect_timeout: Duration,
    /// Read timeout for REST calls; `None` disables it.
    pub read_timeout: Option<Duration>,
    pub write_timeout: Duration,
}

impl Default for OpencodeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVER_URL.to_string(),
            username: DEFAULT_USERNAME.to_string(),
            password: String::new(),
            user_agent: None,
            extra_headers: BTreeMap::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl OpencodeConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Whole-request deadline for REST calls: the write bound plus the read bound.
    ///
    /// reqwest has no per-phase write timeout, so this deadline is what stops a
    /// stalled upload. `None` when reads are unbounded.
    pub fn request_deadline(&self) -> Option<Duration> {
        self.read_timeout
            .map(|read| read.saturating_add(self.write_timeout))
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.extra_headers.extend(headers);
        self
    }
}
