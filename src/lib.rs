//! Beat Duel - a rhythm game that charts whatever song you give it
//!
//! Core modules:
//! - `sim`: Deterministic gameplay (onset detection, judgment, scoring)
//! - `audio`: Decoding uploads into sample buffers
//! - `lobby`: Client side of the two-player room gates
//! - `relay`: Wire protocol and the room coordinator server
//! - `platform`: Browser glue (HUD, canvas, input, relay socket)
//! - `settings`: Player-adjustable configuration

pub mod audio;
pub mod error;
pub mod input;
pub mod lobby;
pub mod platform;
pub mod relay;
pub mod settings;
pub mod sim;

pub use error::{DecodeError, InputError, ProtocolError};
pub use settings::Settings;

/// Game configuration constants
pub mod consts {
    /// Onset analysis window length (seconds of audio per flux sample)
    pub const ANALYSIS_WINDOW_SECS: f64 = 0.05;
    /// Seconds per flux index when converting peaks to note times.
    /// Deliberately not equal to the analysis window; charts are tuned to it.
    pub const ONSET_TIME_SCALE: f64 = 0.09;
    /// Minimum gap between two accepted onsets
    pub const ONSET_DEBOUNCE_SECS: f64 = 0.3;
    /// A peak must exceed this fraction of the mean flux
    pub const PEAK_THRESHOLD_RATIO: f64 = 0.5;

    /// Fallback chart for video sources: one note per interval
    pub const CADENCE_INTERVAL_SECS: f64 = 0.6;
    pub const CADENCE_NOTE_COUNT: u32 = 100;

    /// Pixels per second of scroll at 1x speed
    pub const BASE_SCROLL_RATE: f64 = 900.0;
    /// Default scroll speed multiplier
    pub const DEFAULT_SCROLL_SPEED: f64 = 2.0;
    pub const MIN_SCROLL_SPEED: f64 = 0.5;
    pub const MAX_SCROLL_SPEED: f64 = 10.0;
    /// Note sprite edge length (pixels)
    pub const NOTE_SIZE: f64 = 30.0;

    /// Input matches a note when |note.time - now| is below this
    pub const HIT_WINDOW_SECS: f64 = 0.3;
    /// Notes older than this are missed automatically
    pub const MISS_WINDOW_LATE_SECS: f64 = 0.3;
    /// Accepted range for configured judge windows
    pub const MIN_JUDGE_WINDOW_SECS: f64 = 0.05;
    pub const MAX_JUDGE_WINDOW_SECS: f64 = 1.0;

    /// Player state bounds and deltas
    pub const MAX_HEALTH: u8 = 100;
    pub const HIT_SCORE: i64 = 100;
    pub const MISS_PENALTY: i64 = 100;
    pub const HIT_HEALTH_GAIN: u8 = 2;
    pub const MISS_HEALTH_LOSS: u8 = 10;

    /// Countdown steps before a song starts (one per second)
    pub const COUNTDOWN_STEPS: u32 = 3;

    /// Players per room
    pub const ROOM_CAPACITY: usize = 2;
}
