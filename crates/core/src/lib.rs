// crates/core/src/lib.rs
pub mod backend;
pub mod config;
pub mod easer;
pub mod error;
pub mod finish;
pub mod metrics;
pub mod orchestrator;
pub mod poller;
pub mod prefs;
pub mod progress;
pub mod summary;

pub use backend::{HttpBackend, SyncBackend};
pub use config::{ClientConfig, SyncTiming};
pub use error::*;
pub use orchestrator::{
    FailureKind, FinishTrigger, OrchestratorState, RecoveryAction, StartOutcome, SyncEvent,
    SyncFailure, SyncOrchestrator,
};
pub use prefs::PrefsStore;
pub use progress::ProgressSnapshot;
pub use summary::{headline, metrics_line, SummaryPanel, SummaryStore, SummaryView};
