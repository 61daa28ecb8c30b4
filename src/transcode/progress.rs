//! Phase-weighted compression progress.
//!
//! 10 when metadata is ready, 20 when recording starts, 20..95 while frames
//! are captured (proportional to playback position), 100 on finish. Updates
//! are monotonic, whole-percent steps, and 100 is reported exactly once.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

const METADATA_READY: u8 = 10;
const RECORDING_STARTED: u8 = 20;
const CAPTURE_END: u8 = 95;
const DONE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProgressPhase {
    Preparing,
    Recording,
    Finalizing,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub percent: u8,
    pub phase: ProgressPhase,
}

pub(crate) struct ProgressTracker {
    callback: Option<ProgressCallback>,
    last: Option<u8>,
    finished: bool,
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("last", &self.last)
            .field("finished", &self.finished)
            .finish()
    }
}

impl ProgressTracker {
    pub(crate) fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            last: None,
            finished: false,
        }
    }

    fn emit(&mut self, percent: u8, phase: ProgressPhase) {
        if self.finished || self.last.is_some_and(|last| percent <= last) {
            return;
        }
        self.last = Some(percent);
        if let Some(cb) = &self.callback {
            cb(ProgressUpdate { percent, phase });
        }
    }

    pub(crate) fn metadata_ready(&mut self) {
        self.emit(METADATA_READY, ProgressPhase::Preparing);
    }

    pub(crate) fn recording_started(&mut self) {
        self.emit(RECORDING_STARTED, ProgressPhase::Recording);
    }

    /// Map a playback position onto 20..95. Unknown duration reports nothing.
    pub(crate) fn captured(&mut self, position: f64, duration: Option<f64>) {
        let Some(duration) = duration.filter(|d| *d > 0.0) else {
            return;
        };
        if !position.is_finite() {
            return;
        }
        let fraction = (position / duration).clamp(0.0, 1.0);
        let span = (CAPTURE_END - RECORDING_STARTED) as f64;
        let percent = RECORDING_STARTED + (fraction * span).floor() as u8;
        self.emit(percent, ProgressPhase::Recording);
    }

    pub(crate) fn finalizing(&mut self) {
        self.emit(CAPTURE_END, ProgressPhase::Finalizing);
    }

    pub(crate) fn finish(&mut self) {
        self.emit(DONE, ProgressPhase::Done);
        self.finished = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recording() -> (ProgressTracker, Arc<Mutex<Vec<ProgressUpdate>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let cb: ProgressCallback = Arc::new(move |u| sink.lock().push(u));
        (ProgressTracker::new(Some(cb)), seen)
    }

    fn percents(seen: &Mutex<Vec<ProgressUpdate>>) -> Vec<u8> {
        seen.lock().iter().map(|u| u.percent).collect()
    }

    #[test]
    fn full_run_is_monotonic_with_single_hundred() {
        let (mut p, seen) = recording();
        p.metadata_ready();
        p.recording_started();
        for i in 0..=20 {
            p.captured(i as f64 * 0.5, Some(10.0));
        }
        p.finalizing();
        p.finish();
        p.finish();
        let values = percents(&seen);
        assert!(values.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(values.first(), Some(&10));
        assert_eq!(values.iter().filter(|v| **v == 100).count(), 1);
        assert_eq!(values.last(), Some(&100));
    }

    #[test]
    fn capture_maps_onto_twenty_to_ninety_five() {
        let (mut p, seen) = recording();
        p.recording_started();
        p.captured(5.0, Some(10.0));
        p.captured(20.0, Some(10.0));
        assert_eq!(percents(&seen), vec![20, 57, 95]);
    }

    #[test]
    fn backwards_positions_are_ignored() {
        let (mut p, seen) = recording();
        p.captured(8.0, Some(10.0));
        p.captured(2.0, Some(10.0));
        assert_eq!(percents(&seen), vec![80]);
    }

    #[test]
    fn unknown_duration_reports_nothing_mid_capture() {
        let (mut p, seen) = recording();
        p.recording_started();
        p.captured(3.0, None);
        p.finish();
        assert_eq!(percents(&seen), vec![20, 100]);
    }

    #[test]
    fn passthrough_reports_only_hundred() {
        let (mut p, seen) = recording();
        p.finish();
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].phase, ProgressPhase::Done);
    }

    #[test]
    fn no_callback_is_fine() {
        let mut p = ProgressTracker::new(None);
        p.metadata_ready();
        p.finish();
    }
}
