// crates/core/src/poller.rs
//! Status-poll classification.
//!
//! [`StatusPoller`] turns raw poll results into [`PollOutcome`]s and then into
//! a [`PollStep`] the orchestrator applies. It owns the consecutive-failure
//! counter and the highest target reported so far; the timer that drives it
//! lives in the orchestrator.

use applytrack_types::{PollStatus, PollStatusPayload};

use crate::error::BackendError;
use crate::progress::SCANNING_LABEL;

/// Reported targets stop short of 1.0 until completion is confirmed.
pub const MAX_REPORTED_TARGET: f64 = 0.99;

/// Processed-only estimate: `PROCESSED_ONLY_CEILING * p / (p + PROCESSED_ONLY_HALF)`.
const PROCESSED_ONLY_CEILING: f64 = 0.9;
const PROCESSED_ONLY_HALF: f64 = 200.0;

pub const FAILED_LABEL: &str = "Failed";
pub const CONNECTION_LOST_LABEL: &str = "Lost connection to the sync job";

/// One classified poll result.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Progress {
        processed: Option<u64>,
        total: Option<u64>,
        phase: Option<String>,
        status: PollStatus,
    },
    /// The backend answered but has no record of the job.
    UnknownJob,
    /// The status endpoint returned 404 / `NOT_FOUND`.
    NotFound,
    /// A failure within the retry budget.
    TransientError,
    /// The retry budget is exhausted.
    FatalError,
}

/// What the orchestrator should do after a poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStep {
    /// Keep polling. `target` is the updated reported target, if it moved.
    Continue {
        target: Option<f64>,
        label: String,
    },
    /// Stop polling without touching the error flag; the long-lived request
    /// decides the outcome.
    Stop,
    /// The backend confirmed completion.
    Complete,
    /// Stop polling and fail the job.
    Fail { label: String },
}

/// Human label for a backend phase.
pub fn phase_label(phase: Option<&str>) -> &'static str {
    match phase {
        Some("listing") => "Listing messages…",
        Some("fetching") => "Fetching message details…",
        Some("classifying") => "Classifying emails…",
        Some("matching") => "Matching applications…",
        Some("saving") => "Saving results…",
        Some("finalizing") => "Finalizing…",
        _ => SCANNING_LABEL,
    }
}

/// Map backend counts to a target in `[0, MAX_REPORTED_TARGET]`.
///
/// With a known total this is the plain ratio. With only a processed count
/// the estimate grows sub-linearly and stays well below the cap, so a long
/// listing phase keeps the bar moving without promising completion.
pub fn target_from_counts(processed: Option<u64>, total: Option<u64>) -> Option<f64> {
    match (processed, total) {
        (Some(processed), Some(total)) if total > 0 => {
            let ratio = processed.min(total) as f64 / total as f64;
            Some(ratio.min(MAX_REPORTED_TARGET))
        }
        (Some(processed), _) => {
            let p = processed as f64;
            Some(PROCESSED_ONLY_CEILING * p / (p + PROCESSED_ONLY_HALF))
        }
        (None, _) => None,
    }
}

#[derive(Debug, Clone)]
pub struct StatusPoller {
    error_budget: u32,
    consecutive_errors: u32,
    reported_target: f64,
}

impl StatusPoller {
    pub fn new(error_budget: u32) -> Self {
        Self {
            error_budget,
            consecutive_errors: 0,
            reported_target: 0.0,
        }
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Highest target the backend has reported for this job.
    pub fn reported_target(&self) -> f64 {
        self.reported_target
    }

    /// Classify a raw poll result, updating the failure counter.
    pub fn observe(&mut self, result: Result<PollStatusPayload, BackendError>) -> PollOutcome {
        match result {
            Ok(payload) => {
                self.consecutive_errors = 0;
                if payload.ok == Some(false) || payload.status == PollStatus::UnknownSyncId {
                    return PollOutcome::UnknownJob;
                }
                PollOutcome::Progress {
                    processed: payload.processed,
                    total: payload.total,
                    phase: payload.phase,
                    status: payload.status,
                }
            }
            Err(err) if err.is_not_found() => PollOutcome::NotFound,
            Err(err) => {
                self.consecutive_errors += 1;
                tracing::debug!(
                    consecutive = self.consecutive_errors,
                    budget = self.error_budget,
                    error = %err,
                    "status poll failed"
                );
                if self.consecutive_errors > self.error_budget {
                    PollOutcome::FatalError
                } else {
                    PollOutcome::TransientError
                }
            }
        }
    }

    /// Decide what a classified outcome means for the job.
    pub fn step(&mut self, outcome: &PollOutcome) -> PollStep {
        match outcome {
            PollOutcome::UnknownJob | PollOutcome::NotFound => PollStep::Stop,
            PollOutcome::TransientError => PollStep::Continue {
                target: None,
                label: SCANNING_LABEL.to_string(),
            },
            PollOutcome::FatalError => PollStep::Fail {
                label: CONNECTION_LOST_LABEL.to_string(),
            },
            PollOutcome::Progress { status: PollStatus::Completed, .. } => PollStep::Complete,
            PollOutcome::Progress { status: PollStatus::Failed, .. } => PollStep::Fail {
                label: FAILED_LABEL.to_string(),
            },
            PollOutcome::Progress {
                processed,
                total,
                phase,
                ..
            } => {
                let target = target_from_counts(*processed, *total).map(|t| {
                    self.reported_target = self.reported_target.max(t);
                    self.reported_target
                });
                PollStep::Continue {
                    target,
                    label: phase_label(phase.as_deref()).to_string(),
                }
            }
        }
    }
}
