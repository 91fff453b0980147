// crates/core/src/prefs.rs
//! Durable UI preferences.
//!
//! Only the details-disclosure flag outlives the process; the summary itself
//! is re-fetched from the backend on every view entry.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiPrefs {
    #[serde(default)]
    details_open: bool,
}

/// File-backed (or in-memory) store for the disclosure flag.
#[derive(Debug, Clone, Default)]
pub struct PrefsStore {
    path: Option<PathBuf>,
}

impl PrefsStore {
    pub fn in_memory() -> Self {
        Self { path: None }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Last saved disclosure state. Missing or unreadable files read as closed.
    pub fn load_details_open(&self) -> bool {
        let Some(path) = &self.path else {
            return false;
        };
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<UiPrefs>(&bytes) {
                Ok(prefs) => prefs.details_open,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring malformed UI prefs");
                    false
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read UI prefs");
                false
            }
        }
    }

    pub fn save_details_open(&self, open: bool) -> Result<(), SyncError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let prefs_err = |source| SyncError::Prefs {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(prefs_err)?;
        }
        let json = serde_json::to_vec_pretty(&UiPrefs { details_open: open })
            .map_err(|e| prefs_err(std::io::Error::other(e)))?;
        std::fs::write(path, json).map_err(prefs_err)
    }
}
