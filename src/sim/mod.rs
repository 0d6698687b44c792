//! Deterministic gameplay module
//!
//! All chart and judgment logic lives here. This module must stay pure:
//! - Time comes in as an argument, never read from a clock
//! - Seeded RNG only
//! - No rendering, audio or platform dependencies

pub mod clock;
pub mod note;
pub mod onset;
pub mod score;
pub mod state;
pub mod tick;

pub use clock::PlaybackClock;
pub use note::{Lane, Note, NoteSchedule};
pub use onset::{detect, detect_onset_times, synthetic_cadence};
pub use score::{Judgment, PlayerState};
pub use state::{EnginePhase, GameEvent, GameSession, JudgeWindows, RngState};
pub use tick::{NoteSprite, TickInput, ViewMetrics, check_hit, tick};
