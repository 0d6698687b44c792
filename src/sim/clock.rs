//! Playback clock: media time minus the recorded start

use serde::{Deserialize, Serialize};

/// Elapsed track time derived from an external media clock.
///
/// Never reports a value lower than one it already reported, so a jittery
/// media clock can't un-miss a note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackClock {
    start: f64,
    last: f64,
}

impl PlaybackClock {
    /// Start counting from media time `start`
    pub fn started_at(start: f64) -> Self {
        Self { start, last: 0.0 }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    /// Elapsed seconds at media time `now`
    pub fn elapsed(&mut self, now: f64) -> f64 {
        let elapsed = now - self.start;
        if elapsed > self.last {
            self.last = elapsed;
        }
        self.last
    }

    /// Last value handed out
    pub fn last(&self) -> f64 {
        self.last
    }
}
