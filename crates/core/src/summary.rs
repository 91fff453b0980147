// crates/core/src/summary.rs
//! Durable summary of the last sync outcome.
//!
//! The backend has shipped several shapes for the same metrics over time
//! (`scanned` vs `scannedCount`, top-level vs nested under `result`), so every
//! payload goes through [`normalize_summary`] once at the boundary and the rest
//! of the crate only ever sees [`SyncSummary`].

use std::sync::{Mutex, MutexGuard};

use applytrack_types::{SummaryStatus, SyncResultPayload, SyncSummary, RECONNECT_REQUIRED_CODE};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::SyncError;
use crate::prefs::PrefsStore;

const NESTED_KEYS: &[&str] = &["result", "stats", "summary", "lastSync", "last_sync"];
const SCANNED_KEYS: &[&str] = &[
    "scannedCount",
    "scanned_count",
    "scanned",
    "messagesScanned",
    "messages_scanned",
    "emailsScanned",
];
const PAGES_KEYS: &[&str] = &["pagesFetched", "pages_fetched", "pages", "pageCount"];
const UPDATED_KEYS: &[&str] = &[
    "applicationsUpdated",
    "applications_updated",
    "updated",
    "updatedCount",
    "updated_count",
];
const SYNCED_AT_KEYS: &[&str] = &[
    "lastSyncedAt",
    "last_synced_at",
    "syncedAt",
    "finishedAt",
    "finished_at",
];
const REASON_KEYS: &[&str] = &["lastError", "last_error", "error", "message", "reason"];
const DETAIL_KEYS: &[&str] = &["detail", "details", "rawDetail"];
const CODE_KEYS: &[&str] = &["code", "errorCode", "error_code"];

/// Look a key up at the top level, then inside the known nested objects.
fn lookup<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    let top = keys.iter().find_map(|k| fields.get(*k).filter(|v| !v.is_null()));
    top.or_else(|| {
        NESTED_KEYS
            .iter()
            .filter_map(|n| fields.get(*n).and_then(Value::as_object))
            .find_map(|nested| keys.iter().find_map(|k| nested.get(*k).filter(|v| !v.is_null())))
    })
}

fn lookup_count(fields: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    lookup(fields, keys).and_then(|v| match v {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lookup_str(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    lookup(fields, keys)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn lookup_time(fields: &Map<String, Value>) -> Option<DateTime<Utc>> {
    lookup(fields, SYNCED_AT_KEYS).and_then(|v| match v {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        // Unix seconds, or milliseconds when implausibly large for seconds.
        Value::Number(n) => n.as_i64().and_then(|raw| {
            if raw > 100_000_000_000 {
                Utc.timestamp_millis_opt(raw).single()
            } else {
                Utc.timestamp_opt(raw, 0).single()
            }
        }),
        _ => None,
    })
}

/// Map any start-sync or current-status payload onto a [`SyncSummary`].
///
/// `completed_at` stands in for the sync time when a successful payload
/// doesn't carry one (the start-sync response usually doesn't).
pub fn normalize_summary(
    payload: &SyncResultPayload,
    completed_at: Option<DateTime<Utc>>,
) -> SyncSummary {
    if payload.is_not_connected() {
        return SyncSummary::not_connected();
    }

    let fields = &payload.fields;
    let last_synced_at = lookup_time(fields);
    let reason = lookup_str(fields, REASON_KEYS);
    let detail = lookup_str(fields, DETAIL_KEYS);
    let code = lookup_str(fields, CODE_KEYS);

    let status = match payload.status.as_deref() {
        Some("success" | "completed" | "ok" | "done") => SummaryStatus::Success,
        Some("failed" | "error") => SummaryStatus::Failed,
        Some("running" | "in_progress") => SummaryStatus::Running,
        // No explicit status: a recorded sync time means a past success.
        _ if last_synced_at.is_some() => SummaryStatus::Success,
        _ => SummaryStatus::Idle,
    };

    let raw_detail_text = detail.unwrap_or_else(|| {
        serde_json::to_string_pretty(payload).unwrap_or_default()
    });

    SyncSummary {
        status,
        last_synced_at: match status {
            SummaryStatus::Success => last_synced_at.or(completed_at),
            _ => last_synced_at,
        },
        scanned_count: lookup_count(fields, SCANNED_KEYS),
        pages_fetched: lookup_count(fields, PAGES_KEYS),
        applications_updated: lookup_count(fields, UPDATED_KEYS),
        raw_detail_text,
        failure_reason: match status {
            SummaryStatus::Failed => Some(reason.unwrap_or_else(|| "Sync failed".to_string())),
            _ => None,
        },
        reconnect_required: status == SummaryStatus::Failed
            && code.as_deref() == Some(RECONNECT_REQUIRED_CODE),
    }
}

/// Headline for a summary.
pub fn headline(summary: &SyncSummary) -> String {
    match summary.status {
        SummaryStatus::Idle => "No sync yet".to_string(),
        SummaryStatus::Running => "Sync in progress…".to_string(),
        SummaryStatus::Success => "Last sync succeeded".to_string(),
        SummaryStatus::Failed if summary.reconnect_required => {
            "Gmail needs to be reconnected".to_string()
        }
        SummaryStatus::Failed => match &summary.failure_reason {
            Some(reason) => format!("Last sync failed: {reason}"),
            None => "Last sync failed".to_string(),
        },
        SummaryStatus::NotConnected => "Gmail not connected".to_string(),
    }
}

/// One-line metrics rendering, or `None` when there's nothing to show.
pub fn metrics_line(summary: &SyncSummary) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(n) = summary.scanned_count {
        parts.push(format!("{n} emails scanned"));
    }
    if let Some(n) = summary.pages_fetched {
        parts.push(format!("{n} {}", if n == 1 { "page" } else { "pages" }));
    }
    if let Some(n) = summary.applications_updated {
        parts.push(format!(
            "{n} {} updated",
            if n == 1 { "application" } else { "applications" }
        ));
    }
    if let Some(at) = summary.last_synced_at {
        parts.push(at.format("%b %-d, %H:%M UTC").to_string());
    }
    (!parts.is_empty()).then(|| parts.join(" · "))
}

/// What the persistent summary panel should show right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SummaryView {
    /// A sync is in flight; the live progress bar replaces the panel.
    Suppressed,
    Panel(SummaryPanel),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryPanel {
    pub status: SummaryStatus,
    pub headline: String,
    pub metrics_line: Option<String>,
    pub details_open: bool,
    /// Present only when the disclosure is open and there is detail text.
    pub detail: Option<String>,
}

#[derive(Debug, Default)]
struct SummaryInner {
    summary: SyncSummary,
    observed_at: Option<DateTime<Utc>>,
    details_open: bool,
}

/// Last-known sync outcome plus the disclosure flag.
#[derive(Debug)]
pub struct SummaryStore {
    inner: Mutex<SummaryInner>,
    prefs: PrefsStore,
}

impl SummaryStore {
    pub fn new(prefs: PrefsStore) -> Self {
        let details_open = prefs.load_details_open();
        Self {
            inner: Mutex::new(SummaryInner {
                details_open,
                ..SummaryInner::default()
            }),
            prefs,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SummaryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::error!("summary lock poisoned; continuing with last state");
            poisoned.into_inner()
        })
    }

    pub fn snapshot(&self) -> SyncSummary {
        self.lock().summary.clone()
    }

    /// Store `summary` unless a more recent observation is already held.
    /// Returns whether it was applied.
    pub fn record(&self, summary: SyncSummary, observed_at: DateTime<Utc>) -> bool {
        let mut inner = self.lock();
        if inner.observed_at.is_some_and(|prev| prev > observed_at) {
            tracing::debug!(
                status = summary.status.as_str(),
                "dropping stale summary observation"
            );
            return false;
        }
        inner.summary = summary;
        inner.observed_at = Some(observed_at);
        true
    }

    pub fn details_open(&self) -> bool {
        self.lock().details_open
    }

    /// Open or close the details disclosure. Refused while a sync is running.
    pub fn set_details_open(&self, open: bool, busy: bool) -> Result<(), SyncError> {
        if busy {
            return Err(SyncError::DetailsLocked);
        }
        self.prefs.save_details_open(open)?;
        self.lock().details_open = open;
        Ok(())
    }

    pub fn view(&self, busy: bool) -> SummaryView {
        if busy {
            return SummaryView::Suppressed;
        }
        let inner = self.lock();
        let summary = &inner.summary;
        let detail = (inner.details_open && !summary.raw_detail_text.is_empty())
            .then(|| summary.raw_detail_text.clone());
        SummaryView::Panel(SummaryPanel {
            status: summary.status,
            headline: headline(summary),
            metrics_line: metrics_line(summary),
            details_open: inner.details_open,
            detail,
        })
    }
}
