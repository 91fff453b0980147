// crates/core/src/metrics.rs
//! Sync metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding binary installs a recorder.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};

/// Describe all sync metrics. Call once after installing a recorder.
pub fn describe_metrics() {
    describe_counter!(
        "applytrack_sync_started_total",
        "Number of mailbox sync jobs started"
    );
    describe_counter!(
        "applytrack_sync_completed_total",
        "Number of mailbox sync jobs that finished successfully"
    );
    describe_counter!(
        "applytrack_sync_failed_total",
        "Number of mailbox sync jobs that ended in an error, by kind"
    );
    describe_counter!(
        "applytrack_poll_errors_total",
        "Number of failed status polls (transient and fatal)"
    );
    describe_histogram!(
        "applytrack_sync_duration_seconds",
        "Wall time from sync start to terminal state"
    );
}

pub fn record_sync_started() {
    counter!("applytrack_sync_started_total").increment(1);
}

pub fn record_poll_error() {
    counter!("applytrack_poll_errors_total").increment(1);
}

/// Record a terminal outcome. `failure_kind` is `None` on success.
pub fn record_sync_finished(failure_kind: Option<&'static str>, duration: Duration) {
    match failure_kind {
        None => counter!("applytrack_sync_completed_total").increment(1),
        Some(kind) => counter!("applytrack_sync_failed_total", "kind" => kind).increment(1),
    }
    histogram!(
        "applytrack_sync_duration_seconds",
        "outcome" => if failure_kind.is_some() { "failed" } else { "success" }
    )
    .record(duration.as_secs_f64());

    tracing::info!(
        outcome = failure_kind.unwrap_or("success"),
        duration_secs = duration.as_secs_f64(),
        "Sync finished"
    );
}
