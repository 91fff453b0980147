// crates/core/src/config.rs
//! Client configuration: backend location, credentials, and sync timing.
//!
//! Resolution order is defaults, then an optional TOML file, then environment
//! variables. The binary layers its own flags on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Default backend URL.
const DEFAULT_API_URL: &str = "http://127.0.0.1:8787";

/// Timing constants for the progress animation and status polling.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncTiming {
    /// Period of the easing timer.
    pub ease_interval: Duration,
    /// Fraction of the remaining gap closed per easing tick.
    pub ease_alpha: f64,
    /// Rise constant of the synthetic curve.
    pub rise_tau: Duration,
    /// Ceiling of the synthetic curve while running.
    pub running_cap: f64,
    /// Period of the status poller.
    pub poll_interval: Duration,
    /// Consecutive transient poll failures tolerated before giving up.
    pub transient_error_budget: u32,
    /// Duration of the ramp-to-100% tween.
    pub finish_tween: Duration,
    /// Frame period of the ramp-to-100% tween.
    pub finish_frame: Duration,
    /// Hard upper bound on the Finishing state.
    pub finish_safety_timeout: Duration,
}

impl Default for SyncTiming {
    fn default() -> Self {
        Self {
            ease_interval: Duration::from_millis(120),
            ease_alpha: 0.2,
            rise_tau: Duration::from_secs(16),
            running_cap: 0.95,
            poll_interval: Duration::from_millis(450),
            transient_error_budget: 3,
            finish_tween: Duration::from_millis(550),
            finish_frame: Duration::from_millis(16),
            finish_safety_timeout: Duration::from_millis(2000),
        }
    }
}

impl SyncTiming {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.ease_alpha > 0.0 && self.ease_alpha <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "ease_alpha",
                message: format!("must be in (0, 1], got {}", self.ease_alpha),
            });
        }
        if !(self.running_cap > 0.0 && self.running_cap < 1.0) {
            return Err(ConfigError::Invalid {
                field: "running_cap",
                message: format!("must be in (0, 1), got {}", self.running_cap),
            });
        }
        for (field, value) in [
            ("ease_interval_ms", self.ease_interval),
            ("poll_interval_ms", self.poll_interval),
            ("finish_frame_ms", self.finish_frame),
            ("rise_tau_ms", self.rise_tau),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Invalid {
                    field,
                    message: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Full client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    /// Timeout for the long-lived start-sync request. Polls use
    /// `poll_timeout`.
    pub request_timeout: Duration,
    pub poll_timeout: Duration,
    /// Where the UI preferences file lives. `None` keeps them in memory.
    pub prefs_path: Option<PathBuf>,
    pub timing: SyncTiming,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            request_timeout: Duration::from_secs(15 * 60),
            poll_timeout: Duration::from_secs(5),
            prefs_path: default_prefs_path(),
            timing: SyncTiming::default(),
        }
    }
}

/// On-disk shape; every field optional so a file may override just one key.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    api_url: Option<String>,
    api_token: Option<String>,
    request_timeout_secs: Option<u64>,
    poll_timeout_secs: Option<u64>,
    prefs_path: Option<PathBuf>,
    #[serde(default)]
    timing: TimingFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TimingFile {
    ease_interval_ms: Option<u64>,
    ease_alpha: Option<f64>,
    rise_tau_ms: Option<u64>,
    running_cap: Option<f64>,
    poll_interval_ms: Option<u64>,
    transient_error_budget: Option<u32>,
    finish_tween_ms: Option<u64>,
    finish_frame_ms: Option<u64>,
    finish_safety_timeout_ms: Option<u64>,
}

impl ClientConfig {
    /// Defaults, overlaid with `path` (when given) and then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = path {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            config.apply_toml(path, &raw)?;
        }
        config.apply_env(|key| std::env::var(key).ok());
        config.timing.validate()?;
        Ok(config)
    }

    fn apply_toml(&mut self, path: &Path, raw: &str) -> Result<(), ConfigError> {
        let file: ConfigFile = toml::from_str(raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if let Some(url) = file.api_url {
            self.api_url = url;
        }
        if file.api_token.is_some() {
            self.api_token = file.api_token;
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.poll_timeout_secs {
            self.poll_timeout = Duration::from_secs(secs);
        }
        if file.prefs_path.is_some() {
            self.prefs_path = file.prefs_path;
        }

        let t = file.timing;
        let timing = &mut self.timing;
        if let Some(ms) = t.ease_interval_ms {
            timing.ease_interval = Duration::from_millis(ms);
        }
        if let Some(alpha) = t.ease_alpha {
            timing.ease_alpha = alpha;
        }
        if let Some(ms) = t.rise_tau_ms {
            timing.rise_tau = Duration::from_millis(ms);
        }
        if let Some(cap) = t.running_cap {
            timing.running_cap = cap;
        }
        if let Some(ms) = t.poll_interval_ms {
            timing.poll_interval = Duration::from_millis(ms);
        }
        if let Some(budget) = t.transient_error_budget {
            timing.transient_error_budget = budget;
        }
        if let Some(ms) = t.finish_tween_ms {
            timing.finish_tween = Duration::from_millis(ms);
        }
        if let Some(ms) = t.finish_frame_ms {
            timing.finish_frame = Duration::from_millis(ms);
        }
        if let Some(ms) = t.finish_safety_timeout_ms {
            timing.finish_safety_timeout = Duration::from_millis(ms);
        }
        Ok(())
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("APPLYTRACK_API_URL") {
            self.api_url = url;
        }
        if let Some(token) = var("APPLYTRACK_API_TOKEN") {
            self.api_token = Some(token);
        }
    }

    /// Full URL for an API path.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_url.trim_end_matches('/'), path)
    }
}

fn default_prefs_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("applytrack").join("ui.json"))
}
