//! Score, combo and health transitions
//!
//! Health bottoming out at zero is not a fail state; play continues.

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Outcome of resolving one note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Judgment {
    Hit,
    Miss,
}

/// Per-player running totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    /// May go negative
    pub score: i64,
    pub combo: u32,
    /// 0..=100
    pub health: u8,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            score: 0,
            combo: 0,
            health: MAX_HEALTH,
        }
    }
}

impl PlayerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a single judgment
    pub fn apply(&mut self, judgment: Judgment) {
        match judgment {
            Judgment::Hit => {
                self.score += HIT_SCORE;
                self.combo += 1;
                self.health = self.health.saturating_add(HIT_HEALTH_GAIN).min(MAX_HEALTH);
            }
            Judgment::Miss => {
                self.score -= MISS_PENALTY;
                self.combo = 0;
                self.health = self.health.saturating_sub(MISS_HEALTH_LOSS);
            }
        }
    }

    /// Health as a percentage for the HUD bar
    pub fn health_percent(&self) -> f64 {
        f64::from(self.health) / f64::from(MAX_HEALTH) * 100.0
    }
}
