// crates/core/src/progress.rs
//! Displayed progress state for the sync indicator.
//!
//! [`ProgressModel`] is a plain value holder: it does no I/O and knows nothing
//! about timers. The easer and the finish sequencer write to it; renderers only
//! ever see the [`ProgressSnapshot`] returned by [`ProgressModel::read`].

use serde::{Deserialize, Serialize};

/// Generic label shown while the backend hasn't reported a phase.
pub const SCANNING_LABEL: &str = "Scanning…";

/// Read-only view of the progress indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub visible: bool,
    /// Value currently painted, in `[0, 1]`.
    pub displayed: f64,
    /// Value the painted bar is easing toward, in `[0, 1]`.
    pub target: f64,
    pub phase_label: String,
    pub errored: bool,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            visible: false,
            displayed: 0.0,
            target: 0.0,
            phase_label: String::new(),
            errored: false,
        }
    }
}

impl ProgressSnapshot {
    /// Whole-number percentage for display.
    pub fn percent(&self) -> u8 {
        (self.displayed * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProgressModel {
    snapshot: ProgressSnapshot,
}

impl ProgressModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.snapshot.visible = visible;
    }

    pub fn set_target(&mut self, target: f64) {
        self.snapshot.target = clamp_unit(target);
    }

    pub fn set_displayed(&mut self, displayed: f64) {
        self.snapshot.displayed = clamp_unit(displayed);
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.snapshot.phase_label = label.into();
    }

    pub fn set_error(&mut self, errored: bool) {
        self.snapshot.errored = errored;
    }

    pub fn displayed(&self) -> f64 {
        self.snapshot.displayed
    }

    pub fn target(&self) -> f64 {
        self.snapshot.target
    }

    pub fn read(&self) -> ProgressSnapshot {
        self.snapshot.clone()
    }

    /// Put the bar back to a fresh, visible, zeroed state for a new job.
    pub fn reset_for_job(&mut self) {
        self.snapshot = ProgressSnapshot {
            visible: true,
            phase_label: SCANNING_LABEL.to_string(),
            ..ProgressSnapshot::default()
        };
    }
}

/// Clamp to `[0, 1]`; NaN becomes 0.
fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}
