//! Platform layer
//!
//! Browser glue around the simulation:
//! - `hud`: DOM text, health bar and lobby panel
//! - `stage`: canvas 2D drawing of receptors and notes
//! - `socket`: relay WebSocket client
//!
//! `countdown` and `layout` are plain logic and build everywhere.

pub mod countdown;
pub mod layout;

#[cfg(target_arch = "wasm32")]
pub mod hud;
#[cfg(target_arch = "wasm32")]
pub mod socket;
#[cfg(target_arch = "wasm32")]
pub mod stage;

pub use countdown::{Countdown, CountdownStep, check_can_start};
pub use layout::{Rect, lane_color, note_rect, receptor_rect};
