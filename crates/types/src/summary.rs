// crates/types/src/summary.rs
//! Normalized last-sync outcome shown in the persistent summary panel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    /// Never synced (or the backend has nothing to report).
    #[default]
    Idle,
    Running,
    Success,
    Failed,
    NotConnected,
}

impl SummaryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::NotConnected => "not_connected",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub status: SummaryStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub scanned_count: Option<u64>,
    pub pages_fetched: Option<u64>,
    pub applications_updated: Option<u64>,
    /// Verbatim backend detail, shown in the expandable details block.
    #[serde(default)]
    pub raw_detail_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// The failure needs the mailbox re-authorized rather than a retry.
    #[serde(default)]
    pub reconnect_required: bool,
}

impl SyncSummary {
    pub fn running() -> Self {
        Self {
            status: SummaryStatus::Running,
            ..Self::default()
        }
    }

    pub fn not_connected() -> Self {
        Self {
            status: SummaryStatus::NotConnected,
            ..Self::default()
        }
    }

    pub fn failed(reason: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            status: SummaryStatus::Failed,
            raw_detail_text: detail.unwrap_or_default(),
            failure_reason: Some(reason.into()),
            ..Self::default()
        }
    }
}
