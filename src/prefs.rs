//! Saved connection preferences.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse connection preferences at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PrefsError {
    fn io(operation: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Last server the user connected to. Stored as a flat JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionPrefs {
    pub server_url: String,
    pub server_password: String,
}

impl ConnectionPrefs {
    pub fn new(server_url: impl Into<String>, server_password: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            server_password: server_password.into(),
        }
    }

    /// `Ok(None)` when nothing has been saved yet.
    pub fn load(path: &Path) -> Result<Option<Self>, PrefsError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(PrefsError::io("reading preferences", path, source)),
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| PrefsError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Write the preferences, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), PrefsError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| PrefsError::io("creating preferences directory", parent, source))?;
        }

        let raw = serde_json::to_string_pretty(self).map_err(|source| PrefsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, raw).map_err(|source| PrefsError::io("writing preferences", path, source))
    }

    /// Forget saved preferences. Clearing twice is fine.
    pub fn clear(path: &Path) -> Result<(), PrefsError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PrefsError::io("removing preferences", path, source)),
        }
    }
}
