// crates/core/src/easer.rs
//! Perceived-progress curve.
//!
//! The backend can sit in one phase for a long time without reporting counts,
//! so the bar is driven by a time-based curve that the real numbers can pull
//! ahead of but never behind. The painted value chases that target with
//! exponential smoothing on a fixed timer.

use std::time::Duration;

use crate::config::SyncTiming;

/// Ceiling of the synthetic curve once completion is known.
pub const FINISHING_CAP: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Easer {
    alpha: f64,
    tau_secs: f64,
    running_cap: f64,
}

impl Easer {
    pub fn new(timing: &SyncTiming) -> Self {
        Self {
            alpha: timing.ease_alpha,
            tau_secs: timing.rise_tau.as_secs_f64(),
            running_cap: timing.running_cap,
        }
    }

    /// `cap * (1 - e^(-t/τ))`.
    pub fn synthetic(&self, elapsed: Duration, cap: f64) -> f64 {
        cap * (1.0 - (-elapsed.as_secs_f64() / self.tau_secs).exp())
    }

    /// Target for one tick: the synthetic curve, unless the backend is ahead.
    pub fn combined_target(&self, elapsed: Duration, finishing: bool, reported: f64) -> f64 {
        let cap = if finishing {
            FINISHING_CAP
        } else {
            self.running_cap
        };
        self.synthetic(elapsed, cap).max(reported)
    }

    /// One smoothing step from `displayed` toward `target`.
    ///
    /// Never moves backwards: a target below the painted value leaves it
    /// where it is.
    pub fn step(&self, displayed: f64, target: f64) -> f64 {
        if target <= displayed {
            return displayed;
        }
        displayed + (target - displayed) * self.alpha
    }
}
