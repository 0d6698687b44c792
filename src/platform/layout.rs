//! Screen geometry for the playfield

use crate::consts::NOTE_SIZE;
use crate::sim::{Lane, NoteSprite};

/// Receptor inset from the note square on each side
const RECEPTOR_INSET: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Outline drawn where notes should be hit
pub fn receptor_rect(lane: Lane, receptor_offset: f64) -> Rect {
    Rect {
        x: lane.x() + RECEPTOR_INSET,
        y: receptor_offset + RECEPTOR_INSET,
        w: NOTE_SIZE - 2.0 * RECEPTOR_INSET,
        h: NOTE_SIZE - 2.0 * RECEPTOR_INSET,
    }
}

pub fn note_rect(sprite: &NoteSprite) -> Rect {
    Rect {
        x: sprite.lane.x(),
        y: sprite.y,
        w: NOTE_SIZE,
        h: NOTE_SIZE,
    }
}

/// CSS fill color per lane
pub fn lane_color(lane: Lane) -> &'static str {
    match lane {
        Lane::Left => "#f0f",
        Lane::Down => "#0ff",
        Lane::Up => "#0f0",
        Lane::Right => "#f80",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receptor_inside_note_square() {
        let r = receptor_rect(Lane::Up, 100.0);
        assert_eq!(r, Rect { x: 185.0, y: 105.0, w: 20.0, h: 20.0 });
    }

    #[test]
    fn test_note_rect() {
        let sprite = NoteSprite {
            index: 0,
            lane: Lane::Right,
            y: 42.0,
        };
        assert_eq!(note_rect(&sprite), Rect { x: 250.0, y: 42.0, w: 30.0, h: 30.0 });
    }

    #[test]
    fn test_lane_colors_distinct() {
        let colors: std::collections::HashSet<_> = Lane::ALL.iter().map(|l| lane_color(*l)).collect();
        assert_eq!(colors.len(), 4);
    }
}
