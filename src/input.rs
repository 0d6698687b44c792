//! Mapping raw key and touch identifiers onto lanes

use crate::sim::Lane;

/// Lane for a `KeyboardEvent.key` value (arrow keys only)
pub fn lane_for_key(key: &str) -> Option<Lane> {
    match key {
        "ArrowLeft" => Some(Lane::Left),
        "ArrowDown" => Some(Lane::Down),
        "ArrowUp" => Some(Lane::Up),
        "ArrowRight" => Some(Lane::Right),
        _ => None,
    }
}

/// Lane for a touch zone's `data-dir` attribute
pub fn lane_for_touch_zone(dir: &str) -> Option<Lane> {
    Lane::from_name(dir.trim())
}
