// crates/core/src/error.rs
use std::path::PathBuf;

use applytrack_types::{ApiErrorBody, ModeError, NOT_FOUND_CODE, RECONNECT_REQUIRED_CODE};
use thiserror::Error;

/// Errors returned by a [`crate::SyncBackend`] call.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Backend rejected request ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
        detail: Option<String>,
    },

    #[error("Resource not found")]
    NotFound,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Classify a non-2xx response. 404 and the `NOT_FOUND` code both
    /// collapse to [`BackendError::NotFound`].
    pub fn from_response(status: u16, body: Option<ApiErrorBody>) -> Self {
        let body = body.unwrap_or(ApiErrorBody {
            code: None,
            message: String::new(),
            detail: None,
        });
        if status == 404 || body.code.as_deref() == Some(NOT_FOUND_CODE) {
            return Self::NotFound;
        }
        let message = if body.message.is_empty() {
            format!("HTTP {status}")
        } else {
            body.message
        };
        Self::Api {
            status,
            code: body.code,
            message,
            detail: body.detail,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// The stored mailbox credential must be re-authorized.
    pub fn is_reconnect_required(&self) -> bool {
        matches!(self, Self::Api { code: Some(code), .. } if code == RECONNECT_REQUIRED_CODE)
    }

    /// Short user-facing message.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            Self::NotFound => "Sync job not found".to_string(),
            Self::Transport(_) => "Could not reach the server".to_string(),
            Self::Decode(_) => "Unexpected response from the server".to_string(),
        }
    }

    /// Optional expandable detail text.
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Api { detail, .. } => detail.clone(),
            Self::Transport(e) | Self::Decode(e) => Some(e.clone()),
            Self::NotFound => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Errors that can occur while loading client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid config value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Errors surfaced by the orchestrator's public API.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    InvalidMode(#[from] ModeError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not persist UI preferences to {path}: {source}")]
    Prefs {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Details can't be toggled while a sync is running")]
    DetailsLocked,
}
