// crates/core/src/finish.rs
//! Ramp-to-100% once completion is confirmed.

use std::time::Duration;

use crate::config::SyncTiming;

/// One completion ramp, from wherever the bar was when completion became
/// known up to 1.0.
///
/// The sequencer is pure; the orchestrator feeds it elapsed time from its
/// frame timer and separately arms a safety timeout, so a stalled frame timer
/// can delay the ramp but never strand the UI in Finishing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinishSequencer {
    from: f64,
    tween: Duration,
    safety_timeout: Duration,
}

/// What a frame of the ramp should do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FinishFrame {
    /// Paint this value and wait for the next frame.
    Paint(f64),
    /// The ramp has reached 1.0.
    Done,
}

impl FinishSequencer {
    pub fn new(from: f64, timing: &SyncTiming) -> Self {
        Self {
            from: from.clamp(0.0, 1.0),
            tween: timing.finish_tween,
            safety_timeout: timing.finish_safety_timeout,
        }
    }

    pub fn safety_timeout(&self) -> Duration {
        self.safety_timeout
    }

    /// Ease-out cubic from `from` to 1.0 over the tween duration.
    pub fn frame(&self, elapsed: Duration) -> FinishFrame {
        if self.tween.is_zero() || elapsed >= self.tween {
            return FinishFrame::Done;
        }
        let t = elapsed.as_secs_f64() / self.tween.as_secs_f64();
        let eased = 1.0 - (1.0 - t).powi(3);
        FinishFrame::Paint(self.from + (1.0 - self.from) * eased)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequencer(from: f64) -> FinishSequencer {
        FinishSequencer::new(from, &SyncTiming::default())
    }

    #[test]
    fn starts_at_current_value() {
        assert_eq!(sequencer(0.4).frame(Duration::ZERO), FinishFrame::Paint(0.4));
    }

    #[test]
    fn reaches_done_after_tween() {
        let s = sequencer(0.4);
        assert_eq!(s.frame(Duration::from_millis(550)), FinishFrame::Done);
        assert_eq!(s.frame(Duration::from_secs(5)), FinishFrame::Done);
    }

    #[test]
    fn frames_are_monotonic() {
        let s = sequencer(0.1);
        let mut last = 0.1;
        for ms in (0..550).step_by(16) {
            match s.frame(Duration::from_millis(ms)) {
                FinishFrame::Paint(v) => {
                    assert!(v >= last, "frame at {ms}ms went backwards");
                    assert!(v <= 1.0);
                    last = v;
                }
                FinishFrame::Done => panic!("finished early at {ms}ms"),
            }
        }
    }

    #[test]
    fn zero_tween_finishes_immediately() {
        let timing = SyncTiming {
            finish_tween: Duration::ZERO,
            ..SyncTiming::default()
        };
        let s = FinishSequencer::new(0.3, &timing);
        assert_eq!(s.frame(Duration::ZERO), FinishFrame::Done);
    }
}
