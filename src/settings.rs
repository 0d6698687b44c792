//! Game settings and preferences
//!
//! Defaults can be overridden by a JSON blob embedded in the page
//! (`<script id="beat-duel-config" type="application/json">`). Nothing is
//! written back.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::sim::{JudgeWindows, ViewMetrics};

/// Game settings/preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Play ===
    /// Scroll speed multiplier (the page's speed input overrides this live)
    pub scroll_speed: f64,
    /// Hit tolerance in seconds
    pub hit_window: f64,
    /// Auto-miss threshold in seconds
    pub miss_window_late: f64,

    // === Layout ===
    /// y of the receptor line; notes land here
    pub receptor_offset: f64,

    // === Multiplayer ===
    /// WebSocket URL of the relay; multiplayer UI is hidden when empty
    pub relay_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scroll_speed: DEFAULT_SCROLL_SPEED,
            hit_window: HIT_WINDOW_SECS,
            miss_window_late: MISS_WINDOW_LATE_SECS,
            receptor_offset: 0.0,
            relay_url: String::new(),
        }
    }
}

impl Settings {
    /// Parse a JSON override, falling back to defaults for missing fields
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut settings: Self = serde_json::from_str(json)?;
        settings.scroll_speed = clamp_scroll_speed(settings.scroll_speed);
        settings.hit_window = clamp_judge_window(settings.hit_window, HIT_WINDOW_SECS);
        settings.miss_window_late =
            clamp_judge_window(settings.miss_window_late, MISS_WINDOW_LATE_SECS);
        Ok(settings)
    }

    pub fn judge_windows(&self) -> JudgeWindows {
        JudgeWindows {
            hit: self.hit_window,
            miss_late: self.miss_window_late,
        }
    }

    pub fn view(&self, canvas_height: f64) -> ViewMetrics {
        ViewMetrics {
            canvas_height,
            receptor_offset: self.receptor_offset,
        }
    }

    /// Apply the speed input's text. Unparseable text keeps the current speed.
    pub fn set_scroll_speed_text(&mut self, text: &str) {
        match parse_scroll_speed(text) {
            Some(speed) => self.scroll_speed = speed,
            None => log::debug!("Ignoring scroll speed {:?}", text),
        }
    }

    /// HUD label for the current speed
    pub fn scroll_speed_label(&self) -> String {
        format!("{}x", self.scroll_speed)
    }

    pub fn multiplayer_enabled(&self) -> bool {
        !self.relay_url.is_empty()
    }
}

/// Clamp to the supported speed range; non-finite input gets the default
pub fn clamp_scroll_speed(speed: f64) -> f64 {
    if speed.is_finite() {
        speed.clamp(MIN_SCROLL_SPEED, MAX_SCROLL_SPEED)
    } else {
        DEFAULT_SCROLL_SPEED
    }
}

/// Clamp a judge window in seconds; non-finite input gets `default`
fn clamp_judge_window(secs: f64, default: f64) -> f64 {
    if secs.is_finite() {
        secs.clamp(MIN_JUDGE_WINDOW_SECS, MAX_JUDGE_WINDOW_SECS)
    } else {
        default
    }
}

/// Parse a speed value typed by the player
pub fn parse_scroll_speed(text: &str) -> Option<f64> {
    let speed: f64 = text.trim().parse().ok()?;
    speed.is_finite().then(|| clamp_scroll_speed(speed))
}
