//! Notes, lanes and the schedule a session plays through

use rand::Rng;
use serde::{Deserialize, Serialize};

/// One of the four directional input channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    Left,
    Down,
    Up,
    Right,
}

impl Lane {
    pub const ALL: [Lane; 4] = [Lane::Left, Lane::Down, Lane::Up, Lane::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::Left => "left",
            Lane::Down => "down",
            Lane::Up => "up",
            Lane::Right => "right",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "left" => Some(Lane::Left),
            "down" => Some(Lane::Down),
            "up" => Some(Lane::Up),
            "right" => Some(Lane::Right),
            _ => None,
        }
    }

    /// Uniformly random lane
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }

    /// Horizontal draw position of the lane column (pixels)
    pub fn x(&self) -> f64 {
        match self {
            Lane::Left => 40.0,
            Lane::Down => 110.0,
            Lane::Up => 180.0,
            Lane::Right => 250.0,
        }
    }
}

/// A timed note. `hit` flips to true once, on either a hit or a miss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Onset time in seconds from the start of the track
    pub time: f64,
    pub lane: Lane,
    #[serde(default)]
    pub hit: bool,
}

impl Note {
    pub fn new(time: f64, lane: Lane) -> Self {
        Self {
            time,
            lane,
            hit: false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.hit
    }
}

/// Notes in ascending time order. Serializes as a plain JSON array; peer
/// payloads are re-sorted on the way in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Note>", into = "Vec<Note>")]
pub struct NoteSchedule {
    notes: Vec<Note>,
}

impl From<Vec<Note>> for NoteSchedule {
    fn from(notes: Vec<Note>) -> Self {
        Self::from_notes(notes)
    }
}

impl From<NoteSchedule> for Vec<Note> {
    fn from(schedule: NoteSchedule) -> Self {
        schedule.notes
    }
}

impl NoteSchedule {
    pub fn new() -> Self {
        Self { notes: Vec::new() }
    }

    /// Build from arbitrary notes, sorting by time
    pub fn from_notes(mut notes: Vec<Note>) -> Self {
        notes.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { notes }
    }

    /// Append a note; callers push in time order
    pub(crate) fn push(&mut self, note: Note) {
        debug_assert!(self.notes.last().is_none_or(|n| n.time <= note.time));
        self.notes.push(note);
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn get(&self, index: usize) -> Option<&Note> {
        self.notes.get(index)
    }

    /// Flip a note to resolved. Returns false if it already was.
    pub(crate) fn resolve(&mut self, index: usize) -> bool {
        match self.notes.get_mut(index) {
            Some(note) if !note.hit => {
                note.hit = true;
                true
            }
            _ => false,
        }
    }

    /// Number of notes still waiting for a hit or miss
    pub fn unresolved_count(&self) -> usize {
        self.notes.iter().filter(|n| !n.hit).count()
    }

    /// Copy of the schedule with every note unresolved (for replaying a
    /// chart received from the relay)
    pub fn fresh(&self) -> Self {
        Self {
            notes: self
                .notes
                .iter()
                .map(|n| Note::new(n.time, n.lane))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_round_trip_names() {
        for lane in Lane::ALL {
            assert_eq!(Lane::from_name(lane.as_str()), Some(lane));
        }
        assert_eq!(Lane::from_name("diagonal"), None);
    }

    #[test]
    fn test_schedule_json_shape() {
        let schedule = NoteSchedule::from_notes(vec![Note::new(0.9, Lane::Up)]);
        let json = serde_json::to_string(&schedule).unwrap();
        assert_eq!(json, r#"[{"time":0.9,"lane":"up","hit":false}]"#);

        // `hit` may be omitted by peers
        let parsed: NoteSchedule = serde_json::from_str(r#"[{"time":1.5,"lane":"left"}]"#).unwrap();
        assert_eq!(parsed.notes()[0], Note::new(1.5, Lane::Left));
    }

    #[test]
    fn test_from_notes_sorts() {
        let schedule =
            NoteSchedule::from_notes(vec![Note::new(2.0, Lane::Up), Note::new(1.0, Lane::Down)]);
        assert_eq!(schedule.notes()[0].time, 1.0);
        assert_eq!(schedule.notes()[1].time, 2.0);
    }

    #[test]
    fn test_deserialize_unsorted_payload_sorts() {
        let parsed: NoteSchedule = serde_json::from_str(
            r#"[{"time":5.0,"lane":"up"},{"time":1.0,"lane":"left"},{"time":3.0,"lane":"down"}]"#,
        )
        .unwrap();
        let times: Vec<f64> = parsed.notes().iter().map(|n| n.time).collect();
        assert_eq!(times, vec![1.0, 3.0, 5.0]);
        assert_eq!(parsed.notes()[0].lane, Lane::Left);
    }

    #[test]
    fn test_resolve_only_once() {
        let mut schedule = NoteSchedule::from_notes(vec![Note::new(1.0, Lane::Left)]);
        assert!(schedule.resolve(0));
        assert!(!schedule.resolve(0));
        assert!(schedule.notes()[0].hit);
        assert!(!schedule.resolve(5));
    }

    #[test]
    fn test_fresh_clears_hits() {
        let mut schedule = NoteSchedule::from_notes(vec![Note::new(1.0, Lane::Left)]);
        schedule.resolve(0);
        assert_eq!(schedule.fresh().unresolved_count(), 1);
    }
}
