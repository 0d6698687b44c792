//! Session state and core simulation types
//!
//! One `GameSession` per played song. Everything the judgment engine mutates
//! lives here; nothing is global.

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::clock::PlaybackClock;
use super::note::{Lane, NoteSchedule};
use super::score::{Judgment, PlayerState};
use crate::consts::*;

/// Engine lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnginePhase {
    /// Chart ready, waiting for playback to begin
    Scheduling,
    /// Ticking and accepting input
    Active,
    /// Track ended; ticks and inputs are ignored
    Terminated,
}

/// Something the platform layer should react to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    NoteHit { index: usize, lane: Lane },
    NoteMissed { index: usize, lane: Lane },
    /// New totals after a judgment (HUD + relay)
    ScoreChanged(PlayerState),
    Finished,
}

/// Judgment tolerances in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JudgeWindows {
    /// Max |note.time - now| for an input to count
    pub hit: f64,
    /// Notes this far behind `now` are missed automatically
    pub miss_late: f64,
}

impl Default for JudgeWindows {
    fn default() -> Self {
        Self {
            hit: HIT_WINDOW_SECS,
            miss_late: MISS_WINDOW_LATE_SECS,
        }
    }
}

/// Seed for the chart RNG; the same seed charts a file the same way
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn to_rng(&self) -> Pcg32 {
        Pcg32::seed_from_u64(self.seed)
    }
}

/// Complete state of one play-through
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    pub phase: EnginePhase,
    pub schedule: NoteSchedule,
    pub player: PlayerState,
    pub windows: JudgeWindows,
    /// Set when playback starts
    pub clock: Option<PlaybackClock>,
    /// Pending events for the platform layer
    #[serde(skip)]
    events: Vec<GameEvent>,
}

impl GameSession {
    pub fn new(schedule: NoteSchedule, windows: JudgeWindows) -> Self {
        Self {
            phase: EnginePhase::Scheduling,
            schedule,
            player: PlayerState::default(),
            windows,
            clock: None,
            events: Vec::new(),
        }
    }

    /// Begin playback with the media clock reading `now`
    pub fn start(&mut self, now: f64) {
        if self.phase != EnginePhase::Scheduling {
            log::warn!("start() ignored in phase {:?}", self.phase);
            return;
        }
        self.clock = Some(PlaybackClock::started_at(now));
        self.phase = EnginePhase::Active;
        log::info!("Session started with {} notes", self.schedule.len());
    }

    /// Stop for good (track ended)
    pub fn finish(&mut self) {
        if self.phase == EnginePhase::Terminated {
            return;
        }
        self.phase = EnginePhase::Terminated;
        self.events.push(GameEvent::Finished);
        log::info!(
            "Session finished: score {}, {} notes unresolved",
            self.player.score,
            self.schedule.unresolved_count()
        );
    }

    pub fn is_active(&self) -> bool {
        self.phase == EnginePhase::Active
    }

    /// Elapsed track time for media time `now`; None before start
    pub fn elapsed(&mut self, now: f64) -> Option<f64> {
        self.clock.as_mut().map(|c| c.elapsed(now))
    }

    /// Resolve a note and apply the score transition. No-op for notes
    /// already resolved.
    pub(crate) fn resolve(&mut self, index: usize, judgment: Judgment) -> bool {
        let Some(lane) = self.schedule.get(index).map(|n| n.lane) else {
            return false;
        };
        if !self.schedule.resolve(index) {
            return false;
        }

        self.player.apply(judgment);
        self.events.push(match judgment {
            Judgment::Hit => GameEvent::NoteHit { index, lane },
            Judgment::Miss => GameEvent::NoteMissed { index, lane },
        });
        self.events.push(GameEvent::ScoreChanged(self.player));
        true
    }

    /// Take all pending events
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::note::Note;

    fn session() -> GameSession {
        let schedule = NoteSchedule::from_notes(vec![
            Note::new(1.0, Lane::Left),
            Note::new(2.0, Lane::Right),
        ]);
        GameSession::new(schedule, JudgeWindows::default())
    }

    #[test]
    fn test_phase_transitions() {
        let mut s = session();
        assert_eq!(s.phase, EnginePhase::Scheduling);
        assert_eq!(s.elapsed(5.0), None);

        s.start(10.0);
        assert!(s.is_active());
        assert_eq!(s.elapsed(11.5), Some(1.5));

        // Second start is ignored
        s.start(20.0);
        assert_eq!(s.elapsed(12.0), Some(2.0));

        s.finish();
        assert_eq!(s.phase, EnginePhase::Terminated);
        assert_eq!(s.drain_events(), vec![GameEvent::Finished]);
        s.finish();
        assert!(s.drain_events().is_empty());
    }

    #[test]
    fn test_resolve_emits_events_once() {
        let mut s = session();
        assert!(s.resolve(1, Judgment::Hit));
        assert!(!s.resolve(1, Judgment::Miss));
        assert!(!s.resolve(9, Judgment::Hit));

        let events = s.drain_events();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            GameEvent::NoteHit {
                index: 1,
                lane: Lane::Right
            }
        );
        assert!(matches!(events[1], GameEvent::ScoreChanged(p) if p.score == 100 && p.combo == 1));
    }

    #[test]
    fn test_rng_state_reproducible() {
        use rand::Rng;
        let a: u32 = RngState::new(5).to_rng().random();
        let b: u32 = RngState::new(5).to_rng().random();
        assert_eq!(a, b);

        let c: u32 = RngState::new(6).to_rng().random();
        assert_ne!(a, c);
    }

    #[test]
    fn test_rng_state_json_is_just_the_seed() {
        let json = serde_json::to_string(&RngState::new(42)).unwrap();
        assert_eq!(json, r#"{"seed":42}"#);
    }
}
