//! Environment configuration.

use std::env;

use opencode_api::url::DEFAULT_SERVER_URL;
use opencode_api::OpencodeConfig;

use crate::prefs::ConnectionPrefs;

pub const ENV_SERVER_URL: &str = "OPENCODE_SERVER_URL";
pub const ENV_SERVER_PASSWORD: &str = "OPENCODE_SERVER_PASSWORD";
pub const ENV_SERVER_USERNAME: &str = "OPENCODE_SERVER_USERNAME";
pub const ENV_LOG: &str = "OPENCODE_SYNC_LOG";
pub const ENV_LOG_FILE: &str = "OPENCODE_SYNC_LOG_FILE";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    pub server_url: Option<String>,
    pub server_password: Option<String>,
    pub server_username: Option<String>,
    /// `EnvFilter` directives.
    pub log_filter: Option<String>,
    pub log_file: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            server_url: env_string_opt(ENV_SERVER_URL),
            server_password: env_string_opt(ENV_SERVER_PASSWORD),
            server_username: env_string_opt(ENV_SERVER_USERNAME),
            log_filter: env_string_opt(ENV_LOG),
            log_file: env_string_opt(ENV_LOG_FILE),
        }
    }

    /// Client configuration from the environment, falling back to saved
    /// preferences and then to the local default server.
    pub fn client_config(&self, prefs: Option<&ConnectionPrefs>) -> OpencodeConfig {
        let server_url = self
            .server_url
            .clone()
            .or_else(|| prefs.map(|prefs| prefs.server_url.clone()))
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_owned());
        let password = self
            .server_password
            .clone()
            .or_else(|| prefs.map(|prefs| prefs.server_password.clone()))
            .unwrap_or_default();

        let config = OpencodeConfig::new(server_url).with_password(password);
        match &self.server_username {
            Some(username) => config.with_username(username.clone()),
            None => config,
        }
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}
