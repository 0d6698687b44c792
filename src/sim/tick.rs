//! Per-frame scroll and judgment
//!
//! Order inside a frame matters: stale notes are missed first, then the
//! survivors are positioned. `check_hit` repeats the stale pass at its own
//! timestamp so an input landing between frames can't grab a note that is
//! already past the miss line.

use serde::{Deserialize, Serialize};

use super::note::Lane;
use super::score::Judgment;
use super::state::GameSession;
use crate::consts::*;

/// Inputs for a single frame
#[derive(Debug, Clone, Copy)]
pub struct TickInput {
    /// Media clock reading (seconds)
    pub now: f64,
    /// Scroll speed multiplier, re-read every frame
    pub scroll_speed: f64,
    pub view: ViewMetrics,
}

/// Drawable extent of the playfield
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewMetrics {
    pub canvas_height: f64,
    /// Added to every note's y when the receptor line isn't at y = 0
    pub receptor_offset: f64,
}

impl Default for ViewMetrics {
    fn default() -> Self {
        Self {
            canvas_height: 600.0,
            receptor_offset: 0.0,
        }
    }
}

/// A note to draw this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteSprite {
    pub index: usize,
    pub lane: Lane,
    pub y: f64,
}

/// Vertical position of a note at elapsed time `elapsed`
#[inline]
pub fn note_y(note_time: f64, elapsed: f64, scroll_speed: f64, receptor_offset: f64) -> f64 {
    (note_time - elapsed) * BASE_SCROLL_RATE * scroll_speed + receptor_offset
}

/// Miss every unresolved note older than the late window
pub fn resolve_stale(session: &mut GameSession, elapsed: f64) {
    let cutoff = elapsed - session.windows.miss_late;
    // Schedule is time-ordered, so stale notes form a prefix
    let stale = session
        .schedule
        .notes()
        .iter()
        .take_while(|n| n.time < cutoff)
        .count();
    for index in 0..stale {
        if !session.schedule.notes()[index].hit {
            session.resolve(index, Judgment::Miss);
        }
    }
}

/// Advance one display frame. Returns the notes to draw.
pub fn tick(session: &mut GameSession, input: &TickInput) -> Vec<NoteSprite> {
    if !session.is_active() {
        return Vec::new();
    }
    let Some(elapsed) = session.elapsed(input.now) else {
        return Vec::new();
    };

    resolve_stale(session, elapsed);

    let mut sprites = Vec::new();
    for (index, note) in session.schedule.notes().iter().enumerate() {
        let y = note_y(
            note.time,
            elapsed,
            input.scroll_speed,
            input.view.receptor_offset,
        );
        if y >= input.view.canvas_height {
            // Later notes are further down
            break;
        }
        if !note.hit && y > -NOTE_SIZE {
            sprites.push(NoteSprite {
                index,
                lane: note.lane,
                y,
            });
        }
    }
    sprites
}

/// Resolve a lane press at media time `now`. Returns true on a hit; a press
/// with no note in range is ignored.
pub fn check_hit(session: &mut GameSession, lane: Lane, now: f64) -> bool {
    if !session.is_active() {
        return false;
    }
    let Some(elapsed) = session.elapsed(now) else {
        return false;
    };

    resolve_stale(session, elapsed);

    let window = session.windows.hit;
    let found = session
        .schedule
        .notes()
        .iter()
        .take_while(|n| n.time - elapsed < window)
        .position(|n| !n.hit && n.lane == lane && (n.time - elapsed).abs() < window);

    match found {
        Some(index) => session.resolve(index, Judgment::Hit),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::note::{Note, NoteSchedule};
    use crate::sim::state::{EnginePhase, GameEvent, JudgeWindows};

    fn active_session(notes: Vec<Note>) -> GameSession {
        let mut session =
            GameSession::new(NoteSchedule::from_notes(notes), JudgeWindows::default());
        session.start(0.0);
        session
    }

    fn input(now: f64) -> TickInput {
        TickInput {
            now,
            scroll_speed: DEFAULT_SCROLL_SPEED,
            view: ViewMetrics {
                canvas_height: 600.0,
                receptor_offset: 0.0,
            },
        }
    }

    #[test]
    fn test_note_y() {
        assert_eq!(note_y(2.0, 1.0, 2.0, 0.0), 1800.0);
        assert_eq!(note_y(1.0, 1.0, 2.0, 115.0), 115.0);
        assert_eq!(note_y(0.5, 1.0, 1.0, 0.0), -450.0);
    }

    #[test]
    fn test_tick_renders_visible_notes_only() {
        let mut session = active_session(vec![
            Note::new(0.1, Lane::Left),  // y = 180
            Note::new(0.3, Lane::Down),  // y = 540
            Note::new(0.5, Lane::Up),    // y = 900, below canvas
            Note::new(0.0, Lane::Right), // y = 0
        ]);
        let sprites = tick(&mut session, &input(0.0));
        let lanes: Vec<Lane> = sprites.iter().map(|s| s.lane).collect();
        assert_eq!(lanes, vec![Lane::Right, Lane::Left, Lane::Down]);
        assert!((sprites[1].y - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_tick_hides_notes_above_top() {
        let mut session = active_session(vec![Note::new(1.0, Lane::Left)]);
        // y = (1.0 - 1.02) * 1800 = -36, past the sprite size
        let sprites = tick(&mut session, &input(1.02));
        assert!(sprites.is_empty());
        // Not yet stale, so still unresolved
        assert!(!session.schedule.notes()[0].hit);
    }

    #[test]
    fn test_tick_auto_misses_stale_notes() {
        let mut session = active_session(vec![
            Note::new(1.0, Lane::Left),
            Note::new(5.0, Lane::Up),
        ]);
        tick(&mut session, &input(1.31));
        assert!(session.schedule.notes()[0].hit);
        assert!(!session.schedule.notes()[1].hit);
        assert_eq!(session.player.score, -100);
        assert_eq!(session.player.health, 90);

        let events = session.drain_events();
        assert_eq!(
            events[0],
            GameEvent::NoteMissed {
                index: 0,
                lane: Lane::Left
            }
        );
    }

    #[test]
    fn test_miss_boundary_is_exclusive() {
        let mut session = active_session(vec![Note::new(1.0, Lane::Left)]);
        // Exactly at the late window: not stale yet
        resolve_stale(&mut session, 1.0 + MISS_WINDOW_LATE_SECS);
        assert!(!session.schedule.notes()[0].hit);
        // ...and not hittable either
        assert!(!check_hit(&mut session, Lane::Left, 1.0 + MISS_WINDOW_LATE_SECS));
        assert_eq!(session.player.score, 0);
    }

    #[test]
    fn test_check_hit_matches_first_note_in_lane() {
        let mut session = active_session(vec![
            Note::new(1.0, Lane::Left),
            Note::new(1.1, Lane::Left),
            Note::new(1.0, Lane::Up),
        ]);
        assert!(check_hit(&mut session, Lane::Left, 1.05));
        let notes = session.schedule.notes();
        assert!(notes[0].hit);
        assert!(!notes[1].hit);
        assert!(!notes[2].hit);
        assert_eq!(session.player.score, 100);
        assert_eq!(session.player.combo, 1);
    }

    #[test]
    fn test_check_hit_whiff_is_ignored() {
        let mut session = active_session(vec![Note::new(2.0, Lane::Left)]);
        assert!(!check_hit(&mut session, Lane::Left, 1.0));
        assert!(!check_hit(&mut session, Lane::Right, 2.0));
        assert_eq!(session.player.score, 0);
        assert!(session.drain_events().is_empty());
    }

    #[test]
    fn test_late_note_never_hit_between_frames() {
        let mut session = active_session(vec![Note::new(1.0, Lane::Down)]);
        tick(&mut session, &input(1.0));
        // Input arrives 0.35 s late, before the next frame
        assert!(!check_hit(&mut session, Lane::Down, 1.35));
        assert!(session.schedule.notes()[0].hit);
        assert_eq!(session.player.score, -100);
        assert_eq!(session.player.combo, 0);
    }

    #[test]
    fn test_each_note_resolves_once() {
        let mut session = active_session(vec![Note::new(1.0, Lane::Up)]);
        assert!(check_hit(&mut session, Lane::Up, 1.0));
        assert!(!check_hit(&mut session, Lane::Up, 1.0));
        tick(&mut session, &input(5.0));
        assert_eq!(session.player.score, 100);
        let resolutions = session
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::NoteHit { .. } | GameEvent::NoteMissed { .. }))
            .count();
        assert_eq!(resolutions, 1);
    }

    #[test]
    fn test_terminated_session_ignores_input() {
        let mut session = active_session(vec![Note::new(1.0, Lane::Up)]);
        session.finish();
        assert_eq!(session.phase, EnginePhase::Terminated);
        assert!(!check_hit(&mut session, Lane::Up, 1.0));
        assert!(tick(&mut session, &input(5.0)).is_empty());
        assert!(!session.schedule.notes()[0].hit);
    }

    #[test]
    fn test_unstarted_session_does_nothing() {
        let schedule = NoteSchedule::from_notes(vec![Note::new(0.0, Lane::Up)]);
        let mut session = GameSession::new(schedule, JudgeWindows::default());
        assert!(tick(&mut session, &input(10.0)).is_empty());
        assert!(!check_hit(&mut session, Lane::Up, 0.0));
    }

    #[test]
    fn test_empty_schedule_is_fine() {
        let mut session = active_session(Vec::new());
        assert!(tick(&mut session, &input(3.0)).is_empty());
        assert!(!check_hit(&mut session, Lane::Left, 3.0));
    }

    #[test]
    fn test_speed_change_applies_next_frame() {
        let mut session = active_session(vec![Note::new(0.2, Lane::Left)]);
        let slow = tick(&mut session, &input(0.0));
        assert!((slow[0].y - 360.0).abs() < 1e-9);
        let fast = tick(
            &mut session,
            &TickInput {
                scroll_speed: 3.0,
                ..input(0.0)
            },
        );
        assert!((fast[0].y - 540.0).abs() < 1e-9);
    }

    #[test]
    fn test_clock_regression_does_not_revive_notes() {
        let mut session = active_session(vec![Note::new(1.0, Lane::Left)]);
        tick(&mut session, &input(2.0));
        assert!(session.schedule.notes()[0].hit);
        // Media clock jitters backwards
        assert!(!check_hit(&mut session, Lane::Left, 1.0));
        assert_eq!(session.player.score, -100);
    }

    #[test]
    fn test_relayed_unsorted_chart_still_auto_misses() {
        let frame = r#"{"event":"songSelected","data":[{"time":5.0,"lane":"up"},{"time":1.0,"lane":"left"}]}"#;
        let crate::relay::ServerMessage::SongSelected(schedule) =
            crate::relay::ServerMessage::from_frame(frame).unwrap()
        else {
            panic!("expected songSelected");
        };
        let mut session = GameSession::new(schedule.fresh(), JudgeWindows::default());
        session.start(0.0);
        tick(&mut session, &input(2.0));
        let late = session
            .schedule
            .notes()
            .iter()
            .find(|n| n.time == 1.0)
            .unwrap();
        assert!(late.hit);
        assert_eq!(session.player.score, -100);
    }
}
