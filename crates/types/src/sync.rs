// crates/types/src/sync.rs
//! Sync job identity and the start-sync request/response shapes.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest window the backend accepts for a fixed-window scan.
pub const MAX_WINDOW_DAYS: u32 = 365;

/// Client-generated identifier that correlates the long-lived sync request
/// with the status polls for the same job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh random (v4) job id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModeError {
    #[error("window must be between 1 and {MAX_WINDOW_DAYS} days, got {0}")]
    InvalidWindow(u32),
}

/// Which slice of the mailbox a scan covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Everything received since the previous successful sync.
    SinceLast,
    /// A fixed number of days back from now.
    FixedWindow { days: u32 },
}

impl SyncMode {
    /// Build a fixed-window mode, rejecting windows the backend won't accept.
    pub fn fixed_window(days: u32) -> Result<Self, ModeError> {
        if days == 0 || days > MAX_WINDOW_DAYS {
            return Err(ModeError::InvalidWindow(days));
        }
        Ok(Self::FixedWindow { days })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SinceLast => "since_last",
            Self::FixedWindow { .. } => "fixed_window",
        }
    }

    pub fn window_days(&self) -> Option<u32> {
        match self {
            Self::SinceLast => None,
            Self::FixedWindow { days } => Some(*days),
        }
    }
}

/// One backend-side execution of the mailbox scan, as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncJob {
    pub job_id: JobId,
    pub mode: SyncMode,
}

impl SyncJob {
    pub fn new(mode: SyncMode) -> Self {
        Self {
            job_id: JobId::generate(),
            mode,
        }
    }

    /// Body for `POST /api/gmail/sync`.
    pub fn to_request(&self) -> StartSyncRequest {
        StartSyncRequest {
            sync_id: self.job_id.clone(),
            mode: self.mode.as_str().to_string(),
            window_days: self.mode.window_days(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSyncRequest {
    pub sync_id: JobId,
    pub mode: String,
    pub window_days: Option<u32>,
}

/// Loosely-shaped result object returned by the start-sync and
/// current-status endpoints.
///
/// Metric names differ between backend versions (`scanned` vs
/// `scannedCount`, top-level vs nested under `result`), so the remaining
/// fields are kept verbatim for a single normalization pass downstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncResultPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl SyncResultPayload {
    /// True when the backend reports that no mailbox is connected.
    pub fn is_not_connected(&self) -> bool {
        self.status.as_deref() == Some("not_connected")
            || matches!(
                self.fields.get("connected"),
                Some(serde_json::Value::Bool(false))
            )
    }

    /// True when a 2xx response still reports the job as failed.
    pub fn reports_failure(&self) -> bool {
        matches!(self.status.as_deref(), Some("failed" | "error"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fixed_window_rejects_out_of_range() {
        assert_eq!(SyncMode::fixed_window(0), Err(ModeError::InvalidWindow(0)));
        assert_eq!(
            SyncMode::fixed_window(366),
            Err(ModeError::InvalidWindow(366))
        );
        assert_eq!(
            SyncMode::fixed_window(30),
            Ok(SyncMode::FixedWindow { days: 30 })
        );
    }

    #[test]
    fn start_request_wire_shape() {
        let job = SyncJob {
            job_id: JobId::from("abc"),
            mode: SyncMode::FixedWindow { days: 14 },
        };
        let json = serde_json::to_value(job.to_request()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"syncId": "abc", "mode": "fixed_window", "windowDays": 14})
        );

        let job = SyncJob {
            job_id: JobId::from("xyz"),
            mode: SyncMode::SinceLast,
        };
        let json = serde_json::to_value(job.to_request()).unwrap();
        assert_eq!(json["mode"], "since_last");
        assert!(json["windowDays"].is_null());
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(JobId::generate(), JobId::generate());
    }

    #[test]
    fn result_payload_keeps_unknown_fields() {
        let payload: SyncResultPayload =
            serde_json::from_str(r#"{"status":"success","scanned":12,"result":{"pages":2}}"#)
                .unwrap();
        assert_eq!(payload.status.as_deref(), Some("success"));
        assert_eq!(payload.fields["scanned"], 12);
        assert!(payload.fields.contains_key("result"));
        assert!(!payload.is_not_connected());
    }

    #[test]
    fn not_connected_detected_from_status_or_flag() {
        let by_status: SyncResultPayload =
            serde_json::from_str(r#"{"status":"not_connected"}"#).unwrap();
        assert!(by_status.is_not_connected());

        let by_flag: SyncResultPayload = serde_json::from_str(r#"{"connected":false}"#).unwrap();
        assert!(by_flag.is_not_connected());
    }

    #[test]
    fn failed_status_on_success_response() {
        let failed: SyncResultPayload =
            serde_json::from_str(r#"{"status":"failed","error":"boom"}"#).unwrap();
        assert!(failed.reports_failure());
        let errored: SyncResultPayload = serde_json::from_str(r#"{"status":"error"}"#).unwrap();
        assert!(errored.reports_failure());
        let ok: SyncResultPayload = serde_json::from_str(r#"{"status":"success"}"#).unwrap();
        assert!(!ok.reports_failure());
    }
}
