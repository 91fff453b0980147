// crates/types/src/status.rs
//! Status-by-job-id poll payload.

use serde::{Deserialize, Serialize};

/// Backend-reported job status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    Running,
    Completed,
    Failed,
    /// The backend has no record of the job id (typically after a restart).
    UnknownSyncId,
    /// Anything this client version doesn't know (or no status at all);
    /// treated like `running`.
    #[default]
    #[serde(other)]
    Other,
}

/// Response of `GET /api/gmail/sync/status?syncId=…`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollStatusPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// Missing on `{"ok": false, "error": …}` replies.
    #[serde(default)]
    pub status: PollStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, alias = "done", alias = "count", skip_serializing_if = "Option::is_none")]
    pub processed: Option<u64>,
    #[serde(
        default,
        alias = "totalMessages",
        alias = "total_messages",
        skip_serializing_if = "Option::is_none"
    )]
    pub total: Option<u64>,
}

impl PollStatusPayload {
    pub fn running(processed: Option<u64>, total: Option<u64>) -> Self {
        Self {
            ok: Some(true),
            status: PollStatus::Running,
            phase: None,
            processed,
            total,
        }
    }

    pub fn with_status(status: PollStatus) -> Self {
        Self {
            ok: Some(true),
            status,
            phase: None,
            processed: None,
            total: None,
        }
    }

    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases_and_unknown_status() {
        let p: PollStatusPayload =
            serde_json::from_str(r#"{"status":"paused","done":4,"totalMessages":9}"#).unwrap();
        assert_eq!(p.status, PollStatus::Other);
        assert_eq!(p.processed, Some(4));
        assert_eq!(p.total, Some(9));
        assert_eq!(p.ok, None);
    }

    #[test]
    fn parses_unknown_sync_id() {
        let p: PollStatusPayload =
            serde_json::from_str(r#"{"ok":false,"status":"unknown_sync_id"}"#).unwrap();
        assert_eq!(p.status, PollStatus::UnknownSyncId);
        assert_eq!(p.ok, Some(false));
    }

    #[test]
    fn parses_rejection_without_status() {
        let p: PollStatusPayload =
            serde_json::from_str(r#"{"ok":false,"error":"unknown sync id"}"#).unwrap();
        assert_eq!(p.ok, Some(false));
        assert_eq!(p.status, PollStatus::Other);
        assert_eq!(p.processed, None);
    }
}
