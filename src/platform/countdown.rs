//! Pre-song countdown, driven by a one-second interval

use crate::consts::COUNTDOWN_STEPS;
use crate::error::InputError;
use crate::sim::GameSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStep {
    /// Show this number
    Show(u32),
    /// Hide the overlay and start playback
    Go,
}

#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    remaining: u32,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new(COUNTDOWN_STEPS)
    }
}

impl Countdown {
    pub fn new(steps: u32) -> Self {
        Self { remaining: steps }
    }

    /// What to show right now
    pub fn current(&self) -> CountdownStep {
        if self.remaining == 0 {
            CountdownStep::Go
        } else {
            CountdownStep::Show(self.remaining)
        }
    }

    /// Called once per interval tick
    pub fn advance(&mut self) -> CountdownStep {
        self.remaining = self.remaining.saturating_sub(1);
        self.current()
    }
}

/// Gate for the start button: a track must be loaded and no session may
/// still be playing
pub fn check_can_start(has_track: bool, session: Option<&GameSession>) -> Result<(), InputError> {
    if !has_track {
        return Err(InputError::NoSong);
    }
    if session.is_some_and(GameSession::is_active) {
        return Err(InputError::AlreadyPlaying);
    }
    Ok(())
}
