// crates/core/src/orchestrator.rs
//! Sync progress orchestrator.
//!
//! Owns the Idle → Running → Finishing → Idle (or → Error) state machine for
//! one mailbox sync at a time. Each job runs up to five tasks: the easing
//! timer, the status poller, the long-lived start-sync request, and once
//! completion is known the finish-frame timer plus its safety guard.
//!
//! All state lives in one `Mutex<Inner>`. Every callback locks it, checks that
//! it still belongs to the current job generation and the expected state,
//! mutates, and returns; the lock is never held across an `.await`. Because of
//! that, the `finishing` flag is a plain bool: whichever completion signal
//! takes the lock first flips it and the other sees it set.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use applytrack_types::{
    JobId, PollStatusPayload, SummaryStatus, SyncJob, SyncMode, SyncResultPayload, SyncSummary,
};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::backend::SyncBackend;
use crate::config::SyncTiming;
use crate::easer::Easer;
use crate::error::{BackendError, SyncError};
use crate::finish::{FinishFrame, FinishSequencer};
use crate::metrics;
use crate::poller::{PollOutcome, PollStep, StatusPoller, FAILED_LABEL};
use crate::progress::{ProgressModel, ProgressSnapshot};
use crate::summary::{normalize_summary, SummaryStore, SummaryView};

const FINISHING_LABEL: &str = "Wrapping up…";
const COMPLETED_LABEL: &str = "Sync complete";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    Idle,
    Running,
    Finishing,
    Error,
}

impl OrchestratorState {
    /// A job is in flight and `start()` would be refused.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Running | Self::Finishing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Finishing => "finishing",
            Self::Error => "error",
        }
    }
}

/// How the user gets out of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Start another sync.
    Retry,
    /// Re-authorize the stored mailbox credential.
    Reconnect,
    /// Connect a mailbox for the first time.
    Connect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The backend reported the job as failed.
    JobFailed,
    /// Status polls kept failing past the retry budget.
    ConnectionLost,
    /// The start-sync request was rejected for an expired credential.
    ReconnectRequired,
    /// No mailbox is connected.
    NotConnected,
    /// The start-sync request was rejected for any other reason.
    RequestFailed,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JobFailed => "job_failed",
            Self::ConnectionLost => "connection_lost",
            Self::ReconnectRequired => "reconnect_required",
            Self::NotConnected => "not_connected",
            Self::RequestFailed => "request_failed",
        }
    }

    pub fn recovery(&self) -> RecoveryAction {
        match self {
            Self::ReconnectRequired => RecoveryAction::Reconnect,
            Self::NotConnected => RecoveryAction::Connect,
            Self::JobFailed | Self::ConnectionLost | Self::RequestFailed => RecoveryAction::Retry,
        }
    }
}

/// A terminal failure as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub kind: FailureKind,
    pub message: String,
    pub detail: Option<String>,
}

impl SyncFailure {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    fn from_backend(err: &BackendError) -> Self {
        let kind = if err.is_reconnect_required() {
            FailureKind::ReconnectRequired
        } else {
            FailureKind::RequestFailed
        };
        Self {
            kind,
            message: err.user_message(),
            detail: err.detail(),
        }
    }

    pub fn recovery(&self) -> RecoveryAction {
        self.kind.recovery()
    }

    fn to_summary(&self) -> SyncSummary {
        match self.kind {
            FailureKind::NotConnected => SyncSummary::not_connected(),
            _ => SyncSummary {
                reconnect_required: self.kind == FailureKind::ReconnectRequired,
                ..SyncSummary::failed(self.message.clone(), self.detail.clone())
            },
        }
    }
}

/// Which channel confirmed completion first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishTrigger {
    Poller,
    Request,
}

/// State-machine transitions, broadcast to anyone rendering the sync.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Started { job_id: JobId },
    /// Polling ended without a verdict; the start-sync request decides.
    PollingStopped { job_id: JobId },
    Finishing { job_id: JobId, trigger: FinishTrigger },
    Completed { job_id: JobId },
    Failed { job_id: JobId, failure: SyncFailure },
    /// The start-sync request resolved and its outcome is in the summary.
    RequestSettled { job_id: JobId },
    Dismissed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started(JobId),
    /// A job is already running or finishing; nothing was started.
    AlreadyRunning,
}

#[derive(Default)]
struct Timers {
    easer: Option<JoinHandle<()>>,
    poller: Option<JoinHandle<()>>,
    finish: Option<JoinHandle<()>>,
    guard: Option<JoinHandle<()>>,
}

impl Timers {
    fn abort_all(&mut self) {
        for handle in [
            self.easer.take(),
            self.poller.take(),
            self.finish.take(),
            self.guard.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }
}

struct Inner {
    state: OrchestratorState,
    /// Bumped on every `start()`; callbacks carrying an older value are stale.
    generation: u64,
    job: Option<SyncJob>,
    started_at: Instant,
    finishing: bool,
    progress: ProgressModel,
    poller: StatusPoller,
    last_processed: Option<u64>,
    finish: Option<(FinishSequencer, Instant)>,
    /// Successful start-sync payload, held until the ramp completes.
    request_result: Option<SyncResultPayload>,
    failure: Option<SyncFailure>,
    timers: Timers,
    request: Option<JoinHandle<()>>,
}

impl Inner {
    fn job_id(&self) -> Option<JobId> {
        self.job.as_ref().map(|j| j.job_id.clone())
    }
}

struct Shared {
    inner: Mutex<Inner>,
    backend: Arc<dyn SyncBackend>,
    timing: SyncTiming,
    easer: Easer,
    summary: SummaryStore,
    events: broadcast::Sender<SyncEvent>,
    progress_tx: watch::Sender<ProgressSnapshot>,
}

/// Handle to the process-wide sync orchestrator. Cheap to clone.
///
/// Methods that start timers (`start`) must be called from inside a Tokio
/// runtime.
#[derive(Clone)]
pub struct SyncOrchestrator {
    shared: Arc<Shared>,
}

impl SyncOrchestrator {
    pub fn new(backend: Arc<dyn SyncBackend>, timing: SyncTiming, summary: SummaryStore) -> Self {
        let (events, _) = broadcast::channel(64);
        let (progress_tx, _) = watch::channel(ProgressSnapshot::default());
        let poller = StatusPoller::new(timing.transient_error_budget);
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: OrchestratorState::Idle,
                    generation: 0,
                    job: None,
                    started_at: Instant::now(),
                    finishing: false,
                    progress: ProgressModel::new(),
                    poller,
                    last_processed: None,
                    finish: None,
                    request_result: None,
                    failure: None,
                    timers: Timers::default(),
                    request: None,
                }),
                backend,
                easer: Easer::new(&timing),
                timing,
                summary,
                events,
                progress_tx,
            }),
        }
    }

    /// Start a sync job unless one is already in flight.
    pub fn start(&self, mode: SyncMode) -> StartOutcome {
        let shared = &self.shared;
        let mut inner = shared.lock();
        if inner.state.is_busy() {
            tracing::debug!(state = inner.state.as_str(), "start ignored; sync already in flight");
            return StartOutcome::AlreadyRunning;
        }

        // Leftovers from the previous job: its timers are already gone, but
        // a request that outlived an Error may still be pending.
        inner.timers.abort_all();
        if let Some(request) = inner.request.take() {
            request.abort();
        }

        inner.generation += 1;
        let generation = inner.generation;
        let job = SyncJob::new(mode);
        let job_id = job.job_id.clone();

        inner.state = OrchestratorState::Running;
        inner.job = Some(job.clone());
        inner.started_at = Instant::now();
        inner.finishing = false;
        inner.poller = StatusPoller::new(shared.timing.transient_error_budget);
        inner.last_processed = None;
        inner.finish = None;
        inner.request_result = None;
        inner.failure = None;
        inner.progress.reset_for_job();
        shared.publish(&inner);

        let weak = Arc::downgrade(shared);
        inner.timers.easer = Some(tokio::spawn(run_easer(
            weak.clone(),
            generation,
            shared.timing.ease_interval,
        )));
        inner.timers.poller = Some(tokio::spawn(run_poller(
            weak.clone(),
            Arc::clone(&shared.backend),
            generation,
            job_id.clone(),
            shared.timing.poll_interval,
        )));
        inner.request = Some(tokio::spawn(run_request(
            weak,
            Arc::clone(&shared.backend),
            generation,
            job,
        )));

        shared.summary.record(SyncSummary::running(), Utc::now());
        metrics::record_sync_started();
        tracing::info!(
            job_id = %job_id,
            generation,
            mode = mode.as_str(),
            window_days = mode.window_days(),
            "sync started"
        );
        shared.emit(SyncEvent::Started {
            job_id: job_id.clone(),
        });
        StartOutcome::Started(job_id)
    }

    /// Leave the Error state. Returns false when there was no error to dismiss.
    pub fn dismiss_error(&self) -> bool {
        let mut inner = self.shared.lock();
        if inner.state != OrchestratorState::Error {
            return false;
        }
        inner.state = OrchestratorState::Idle;
        inner.failure = None;
        inner.progress.set_error(false);
        inner.progress.set_visible(false);
        self.shared.publish(&inner);
        self.shared.emit(SyncEvent::Dismissed);
        true
    }

    pub fn state(&self) -> OrchestratorState {
        self.shared.lock().state
    }

    pub fn is_busy(&self) -> bool {
        self.state().is_busy()
    }

    /// The current job's start-sync request has not resolved yet.
    pub fn request_pending(&self) -> bool {
        self.shared.lock().request.is_some()
    }

    pub fn active_job_id(&self) -> Option<JobId> {
        self.shared.lock().job_id()
    }

    /// The failure currently shown, while in the Error state.
    pub fn current_failure(&self) -> Option<SyncFailure> {
        self.shared.lock().failure.clone()
    }

    pub fn current_progress(&self) -> ProgressSnapshot {
        self.shared.lock().progress.read()
    }

    /// Receiver that sees every repaint of the progress indicator.
    pub fn subscribe_progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.shared.progress_tx.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.shared.events.subscribe()
    }

    pub fn current_summary(&self) -> SyncSummary {
        self.shared.summary.snapshot()
    }

    pub fn summary_view(&self) -> SummaryView {
        self.shared.summary.view(self.is_busy())
    }

    pub fn set_details_open(&self, open: bool) -> Result<(), SyncError> {
        self.shared.summary.set_details_open(open, self.is_busy())
    }

    /// Re-fetch the last outcome from the backend (on view entry).
    ///
    /// Ignored if the orchestrator recorded something newer while the request
    /// was in flight.
    pub async fn refresh_summary(&self) -> Result<SyncSummary, SyncError> {
        let observed_at = Utc::now();
        let payload = self.shared.backend.current_status().await?;
        let summary = normalize_summary(&payload, None);
        if !self.shared.summary.record(summary, observed_at) {
            tracing::debug!("summary refresh superseded by a newer sync outcome");
        }
        Ok(self.shared.summary.snapshot())
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::error!("orchestrator lock poisoned; continuing with last state");
            poisoned.into_inner()
        })
    }

    fn publish(&self, inner: &Inner) {
        self.progress_tx.send_replace(inner.progress.read());
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn on_ease_tick(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        let finishing = match inner.state {
            OrchestratorState::Running => false,
            OrchestratorState::Finishing => true,
            OrchestratorState::Idle | OrchestratorState::Error => return false,
        };
        let target = self
            .easer
            .combined_target(
                inner.started_at.elapsed(),
                finishing,
                inner.poller.reported_target(),
            )
            .max(inner.progress.target());
        inner.progress.set_target(target);
        let next = self.easer.step(inner.progress.displayed(), target);
        inner.progress.set_displayed(next);
        self.publish(&inner);
        true
    }

    /// Apply one poll result. Returns whether polling should continue.
    fn on_poll_result(
        self: &Arc<Self>,
        generation: u64,
        result: Result<PollStatusPayload, BackendError>,
    ) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation || inner.state != OrchestratorState::Running {
            return false;
        }
        let Some(job_id) = inner.job_id() else {
            return false;
        };

        let outcome = inner.poller.observe(result);
        if matches!(outcome, PollOutcome::TransientError | PollOutcome::FatalError) {
            metrics::record_poll_error();
        }
        if let PollOutcome::Progress {
            processed: Some(processed),
            ..
        } = outcome
        {
            inner.last_processed = Some(processed);
        }

        match inner.poller.step(&outcome) {
            PollStep::Continue { target, label } => {
                if let Some(reported) = target {
                    let target = reported.max(inner.progress.target());
                    inner.progress.set_target(target);
                }
                inner.progress.set_label(label);
                self.publish(&inner);
                true
            }
            PollStep::Stop => {
                tracing::info!(
                    job_id = %job_id,
                    outcome = ?outcome,
                    "backend has no record of the job; waiting on the sync request"
                );
                inner.timers.poller = None;
                self.emit(SyncEvent::PollingStopped { job_id });
                false
            }
            PollStep::Complete => {
                self.begin_finishing(&mut inner, FinishTrigger::Poller);
                false
            }
            PollStep::Fail { label } => {
                let kind = match outcome {
                    PollOutcome::FatalError => FailureKind::ConnectionLost,
                    _ => FailureKind::JobFailed,
                };
                self.fail(&mut inner, SyncFailure::new(kind, label));
                false
            }
        }
    }

    fn on_request_resolved(
        self: &Arc<Self>,
        generation: u64,
        result: Result<SyncResultPayload, BackendError>,
    ) {
        let mut inner = self.lock();
        if inner.generation != generation {
            tracing::debug!(generation, "ignoring sync response from a superseded job");
            return;
        }
        inner.request = None;
        let state = inner.state;

        match result {
            Ok(payload) if payload.is_not_connected() => {
                let failure = SyncFailure::new(FailureKind::NotConnected, "Gmail is not connected");
                if state.is_busy() {
                    self.fail(&mut inner, failure);
                } else {
                    self.summary.record(failure.to_summary(), Utc::now());
                }
            }
            Ok(payload) if payload.reports_failure() => {
                let recorded = normalize_summary(&payload, None);
                let failure = SyncFailure {
                    kind: if recorded.reconnect_required {
                        FailureKind::ReconnectRequired
                    } else {
                        FailureKind::JobFailed
                    },
                    message: recorded
                        .failure_reason
                        .clone()
                        .unwrap_or_else(|| FAILED_LABEL.to_string()),
                    detail: (!recorded.raw_detail_text.is_empty())
                        .then(|| recorded.raw_detail_text.clone()),
                };
                if state.is_busy() {
                    self.fail(&mut inner, failure);
                } else {
                    self.summary.record(recorded, Utc::now());
                }
            }
            Ok(payload) => match state {
                OrchestratorState::Running => {
                    inner.request_result = Some(payload);
                    self.begin_finishing(&mut inner, FinishTrigger::Request);
                }
                OrchestratorState::Finishing => {
                    // The ramp is already running; its completion records this.
                    inner.request_result = Some(payload);
                }
                OrchestratorState::Idle | OrchestratorState::Error => {
                    let now = Utc::now();
                    tracing::info!(
                        state = state.as_str(),
                        "sync request succeeded after the job settled; recording outcome"
                    );
                    self.summary.record(normalize_summary(&payload, Some(now)), now);
                }
            },
            Err(err) => {
                let failure = SyncFailure::from_backend(&err);
                if state.is_busy() {
                    self.fail(&mut inner, failure);
                } else {
                    tracing::warn!(
                        state = state.as_str(),
                        error = %err,
                        "sync request failed after the job settled; recording outcome"
                    );
                    self.summary.record(failure.to_summary(), Utc::now());
                    if state == OrchestratorState::Error {
                        inner.progress.set_label(failure.message.clone());
                        inner.failure = Some(failure);
                        self.publish(&inner);
                    }
                }
            }
        }

        if let Some(job_id) = inner.job_id() {
            self.emit(SyncEvent::RequestSettled { job_id });
        }
    }

    /// Running → Finishing. At most once per job.
    fn begin_finishing(self: &Arc<Self>, inner: &mut Inner, trigger: FinishTrigger) {
        if inner.finishing {
            tracing::debug!(?trigger, "completion already in progress; ignoring duplicate signal");
            return;
        }
        let Some(job_id) = inner.job_id() else {
            return;
        };
        inner.finishing = true;
        inner.state = OrchestratorState::Finishing;
        if let Some(poller) = inner.timers.poller.take() {
            poller.abort();
        }

        inner.progress.set_target(1.0);
        inner.progress.set_label(FINISHING_LABEL);
        let sequencer = FinishSequencer::new(inner.progress.displayed(), &self.timing);
        let safety_timeout = sequencer.safety_timeout();
        inner.finish = Some((sequencer, Instant::now()));
        self.publish(inner);

        let weak = Arc::downgrade(self);
        inner.timers.finish = Some(tokio::spawn(run_finish_frames(
            weak.clone(),
            inner.generation,
            self.timing.finish_frame,
        )));
        inner.timers.guard = Some(tokio::spawn(run_finish_guard(
            weak,
            inner.generation,
            safety_timeout,
        )));

        tracing::info!(job_id = %job_id, ?trigger, "sync confirmed complete; finishing");
        self.emit(SyncEvent::Finishing { job_id, trigger });
    }

    fn on_finish_frame(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation || inner.state != OrchestratorState::Finishing {
            return false;
        }
        let Some((sequencer, began)) = inner.finish else {
            return false;
        };
        match sequencer.frame(began.elapsed()) {
            FinishFrame::Paint(value) => {
                let value = value.max(inner.progress.displayed());
                inner.progress.set_displayed(value);
                self.publish(&inner);
                true
            }
            FinishFrame::Done => {
                self.complete(&mut inner);
                false
            }
        }
    }

    fn on_finish_timeout(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation != generation || inner.state != OrchestratorState::Finishing {
            return;
        }
        tracing::warn!(
            timeout_ms = self.timing.finish_safety_timeout.as_millis() as u64,
            "finish animation stalled; forcing completion"
        );
        self.complete(&mut inner);
    }

    /// Finishing → Idle, recording the success summary.
    fn complete(&self, inner: &mut Inner) {
        let Some(job_id) = inner.job_id() else {
            return;
        };
        inner.state = OrchestratorState::Idle;
        inner.timers.abort_all();
        inner.finish = None;
        inner.progress.set_target(1.0);
        inner.progress.set_displayed(1.0);
        inner.progress.set_label(COMPLETED_LABEL);
        inner.progress.set_visible(false);
        self.publish(inner);

        let now = Utc::now();
        let summary = match inner.request_result.take() {
            Some(payload) => normalize_summary(&payload, Some(now)),
            // The poller confirmed first; the request may still land later and
            // refine these numbers.
            None => SyncSummary {
                status: SummaryStatus::Success,
                last_synced_at: Some(now),
                scanned_count: inner.last_processed,
                ..SyncSummary::default()
            },
        };
        self.summary.record(summary, now);
        metrics::record_sync_finished(None, inner.started_at.elapsed());
        self.emit(SyncEvent::Completed { job_id });
    }

    /// Any busy state → Error. Timers stop; the request is left to land so
    /// its outcome can still be recorded.
    fn fail(&self, inner: &mut Inner, failure: SyncFailure) {
        let Some(job_id) = inner.job_id() else {
            return;
        };
        inner.state = OrchestratorState::Error;
        inner.timers.abort_all();
        inner.finish = None;
        inner.progress.set_error(true);
        inner.progress.set_label(failure.message.clone());
        self.publish(inner);

        self.summary.record(failure.to_summary(), Utc::now());
        metrics::record_sync_finished(Some(failure.kind.as_str()), inner.started_at.elapsed());
        tracing::warn!(
            job_id = %job_id,
            kind = failure.kind.as_str(),
            message = %failure.message,
            "sync failed"
        );
        self.emit(SyncEvent::Failed {
            job_id,
            failure: failure.clone(),
        });
        inner.failure = Some(failure);
    }
}

async fn run_easer(shared: Weak<Shared>, generation: u64, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        if !shared.on_ease_tick(generation) {
            break;
        }
    }
}

async fn run_poller(
    shared: Weak<Shared>,
    backend: Arc<dyn SyncBackend>,
    generation: u64,
    job_id: JobId,
    period: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    // A slow poll delays the next one instead of stacking requests.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let result = backend.poll_status(&job_id).await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        if !shared.on_poll_result(generation, result) {
            break;
        }
    }
}

async fn run_request(
    shared: Weak<Shared>,
    backend: Arc<dyn SyncBackend>,
    generation: u64,
    job: SyncJob,
) {
    let result = backend.start_sync(&job).await;
    if let Some(shared) = shared.upgrade() {
        shared.on_request_resolved(generation, result);
    }
}

async fn run_finish_frames(shared: Weak<Shared>, generation: u64, frame: Duration) {
    let mut ticker = tokio::time::interval(frame);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        if !shared.on_finish_frame(generation) {
            break;
        }
    }
}

async fn run_finish_guard(shared: Weak<Shared>, generation: u64, timeout: Duration) {
    tokio::time::sleep(timeout).await;
    if let Some(shared) = shared.upgrade() {
        shared.on_finish_timeout(generation);
    }
}
