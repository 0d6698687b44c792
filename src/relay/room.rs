//! Two-player rooms and the table that routes frames to them
//!
//! Gates: join → song upload → song vote → difficulty vote → live. Each gate
//! fires once both occupants have submitted. Frames for rooms that don't
//! exist, or from connections that aren't in the room, are dropped.

use std::collections::HashMap;
use std::fmt;

use rand::Rng;
use uuid::Uuid;

use super::protocol::{ClientMessage, PlayerSummary, ServerMessage, SongChoice};
use crate::consts::{MAX_HEALTH, ROOM_CAPACITY};
use crate::sim::NoteSchedule;

/// Identity of one WebSocket connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A message and who should receive it
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: Vec<ConnectionId>,
    pub message: ServerMessage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadedSong {
    pub filename: String,
    pub notes: NoteSchedule,
}

/// Insertion-ordered map for at most a handful of entries
type Slots<V> = Vec<(ConnectionId, V)>;

/// Insert or replace; returns true if the key was new
fn upsert<V>(slots: &mut Slots<V>, id: ConnectionId, value: V) -> bool {
    match slots.iter_mut().find(|(k, _)| *k == id) {
        Some((_, v)) => {
            *v = value;
            false
        }
        None => {
            slots.push((id, value));
            true
        }
    }
}

/// State of one room
#[derive(Debug, Clone, Default)]
pub struct Room {
    players: Slots<PlayerSummary>,
    votes: Slots<String>,
    songs: Slots<UploadedSong>,
    difficulties: Slots<f64>,
}

impl Room {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn occupants(&self) -> Vec<ConnectionId> {
        self.players.iter().map(|(id, _)| *id).collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.players.iter().any(|(k, _)| *k == id)
    }

    pub fn player(&self, id: ConnectionId) -> Option<&PlayerSummary> {
        self.players.iter().find(|(k, _)| *k == id).map(|(_, p)| p)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }

    pub fn song_count(&self) -> usize {
        self.songs.len()
    }

    pub fn difficulty_count(&self) -> usize {
        self.difficulties.len()
    }

    /// Entries of the current occupants, in seat order. A departed player's
    /// entry stays stored but no longer counts toward a gate.
    fn seated<'a, V>(&'a self, slots: &'a Slots<V>) -> Vec<(ConnectionId, &'a V)> {
        self.players
            .iter()
            .filter_map(|(id, _)| slots.iter().find(|(k, _)| k == id))
            .map(|(k, v)| (*k, v))
            .collect()
    }

    /// A gate fires once the room is full and every occupant has submitted
    fn gate_open<V>(&self, seated: &[(ConnectionId, &V)]) -> bool {
        self.players.len() == ROOM_CAPACITY && seated.len() == ROOM_CAPACITY
    }

    fn to_all(&self, message: ServerMessage) -> Outbound {
        Outbound {
            to: self.occupants(),
            message,
        }
    }

    fn player_list(&self) -> Vec<PlayerSummary> {
        self.players.iter().map(|(_, p)| p.clone()).collect()
    }

    /// Seat a player. Refuses a third distinct connection.
    pub fn join(&mut self, id: ConnectionId, username: String) -> Vec<Outbound> {
        if !self.contains(id) && self.players.len() >= ROOM_CAPACITY {
            return vec![Outbound {
                to: vec![id],
                message: ServerMessage::RoomFull,
            }];
        }

        let summary = PlayerSummary {
            username,
            score: 0,
            health: MAX_HEALTH,
        };
        let newly_joined = upsert(&mut self.players, id, summary);

        let mut out = vec![self.to_all(ServerMessage::PlayerList(self.player_list()))];
        if newly_joined && self.players.len() == ROOM_CAPACITY {
            out.push(self.to_all(ServerMessage::RequestSongs));
        }
        out
    }

    /// Record a player's chart; opens the vote once both are in
    pub fn upload_song(&mut self, id: ConnectionId, filename: String, notes: NoteSchedule) -> Vec<Outbound> {
        upsert(&mut self.songs, id, UploadedSong { filename, notes });
        let songs = self.seated(&self.songs);
        if !self.gate_open(&songs) {
            return Vec::new();
        }

        let choices = songs
            .into_iter()
            .map(|(id, song)| SongChoice {
                id: id.to_string(),
                filename: song.filename.clone(),
            })
            .collect();
        vec![self.to_all(ServerMessage::StartSongVote(choices))]
    }

    /// Record a vote; once both are in, agreement wins and disagreement is a
    /// coin flip between the two choices
    pub fn vote_song<R: Rng>(&mut self, id: ConnectionId, song_id: String, rng: &mut R) -> Vec<Outbound> {
        upsert(&mut self.votes, id, song_id);
        let votes = self.seated(&self.votes);
        if !self.gate_open(&votes) {
            return Vec::new();
        }

        let first = votes[0].1;
        let second = votes[1].1;
        let winner = if first == second || rng.random_bool(0.5) {
            first
        } else {
            second
        };

        match self
            .seated(&self.songs)
            .into_iter()
            .find(|(k, _)| k.to_string() == *winner)
        {
            Some((_, song)) => {
                log::info!("Song vote won by {} ({})", winner, song.filename);
                vec![self.to_all(ServerMessage::SongSelected(song.notes.clone()))]
            }
            None => {
                log::debug!("Song vote winner {} has no upload, dropping", winner);
                Vec::new()
            }
        }
    }

    /// Record a speed; once both are in the room starts at their mean
    pub fn vote_difficulty(&mut self, id: ConnectionId, speed: f64) -> Vec<Outbound> {
        if !speed.is_finite() {
            log::debug!("Dropping non-finite speed vote from {}", id);
            return Vec::new();
        }
        upsert(&mut self.difficulties, id, speed);
        let speeds = self.seated(&self.difficulties);
        if !self.gate_open(&speeds) {
            return Vec::new();
        }

        let sum: f64 = speeds.iter().map(|(_, s)| **s).sum();
        let avg = sum / speeds.len() as f64;
        vec![self.to_all(ServerMessage::StartGame(avg))]
    }

    /// Store the sender's totals and mirror them to the other occupant
    pub fn score_update(&mut self, id: ConnectionId, score: i64, health: u8) -> Vec<Outbound> {
        let Some((_, player)) = self.players.iter_mut().find(|(k, _)| *k == id) else {
            return Vec::new();
        };
        player.score = score;
        player.health = health;

        let others: Vec<ConnectionId> = self
            .players
            .iter()
            .map(|(k, _)| *k)
            .filter(|k| *k != id)
            .collect();
        if others.is_empty() {
            return Vec::new();
        }
        vec![Outbound {
            to: others,
            message: ServerMessage::OpponentUpdate { score, health },
        }]
    }

    /// Remove a player. Votes, songs and speeds are left as they are.
    pub fn leave(&mut self, id: ConnectionId) -> Vec<Outbound> {
        let before = self.players.len();
        self.players.retain(|(k, _)| *k != id);
        if self.players.len() == before || self.players.is_empty() {
            return Vec::new();
        }
        vec![self.to_all(ServerMessage::PlayerLeft)]
    }
}

/// All rooms, keyed by name
#[derive(Debug)]
pub struct RoomTable<R> {
    rooms: HashMap<String, Room>,
    rng: R,
}

impl<R: Rng> RoomTable<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rooms: HashMap::new(),
            rng,
        }
    }

    pub fn room(&self, name: &str) -> Option<&Room> {
        self.rooms.get(name)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Apply one client frame
    pub fn handle(&mut self, from: ConnectionId, message: ClientMessage) -> Vec<Outbound> {
        if let ClientMessage::JoinRoom { room, username } = message {
            let entry = self.rooms.entry(room.clone()).or_insert_with(|| {
                log::info!("Room {:?} created", room);
                Room::new()
            });
            log::info!("{} joined room {:?} as {:?}", from, room, username);
            return entry.join(from, username);
        }

        let Some(room) = self.rooms.get_mut(message.room()) else {
            log::debug!("Dropping frame for unknown room {:?}", message.room());
            return Vec::new();
        };
        if !room.contains(from) {
            log::debug!("Dropping frame from {} who is not in the room", from);
            return Vec::new();
        }

        match message {
            ClientMessage::UploadSong {
                song_data,
                filename,
                ..
            } => room.upload_song(from, filename, song_data),
            ClientMessage::VoteSong { song_id, .. } => room.vote_song(from, song_id, &mut self.rng),
            ClientMessage::VoteDifficulty { speed, .. } => room.vote_difficulty(from, speed),
            ClientMessage::ScoreUpdate { score, health, .. } => room.score_update(from, score, health),
            ClientMessage::JoinRoom { .. } => Vec::new(),
        }
    }

    /// Connection closed: leave every room it was in, dropping rooms left empty
    pub fn disconnect(&mut self, id: ConnectionId) -> Vec<Outbound> {
        let mut out = Vec::new();
        for room in self.rooms.values_mut() {
            if room.contains(id) {
                out.extend(room.leave(id));
            }
        }
        self.rooms.retain(|name, room| {
            let keep = !room.is_empty();
            if !keep {
                log::info!("Room {:?} closed", name);
            }
            keep
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Lane, Note};
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn table(seed: u64) -> RoomTable<Pcg32> {
        RoomTable::new(Pcg32::seed_from_u64(seed))
    }

    fn join(t: &mut RoomTable<Pcg32>, id: ConnectionId, name: &str) -> Vec<Outbound> {
        t.handle(
            id,
            ClientMessage::JoinRoom {
                room: "r".into(),
                username: name.into(),
            },
        )
    }

    fn chart(time: f64) -> NoteSchedule {
        NoteSchedule::from_notes(vec![Note::new(time, Lane::Left)])
    }

    fn upload(t: &mut RoomTable<Pcg32>, id: ConnectionId, name: &str, notes: NoteSchedule) -> Vec<Outbound> {
        t.handle(
            id,
            ClientMessage::UploadSong {
                room: "r".into(),
                song_data: notes,
                filename: name.into(),
            },
        )
    }

    fn vote(t: &mut RoomTable<Pcg32>, id: ConnectionId, song: &str) -> Vec<Outbound> {
        t.handle(
            id,
            ClientMessage::VoteSong {
                room: "r".into(),
                song_id: song.into(),
            },
        )
    }

    fn speed(t: &mut RoomTable<Pcg32>, id: ConnectionId, speed: f64) -> Vec<Outbound> {
        t.handle(
            id,
            ClientMessage::VoteDifficulty {
                room: "r".into(),
                speed,
            },
        )
    }

    /// Two players seated with a chart each
    fn seeded_room(seed: u64) -> (RoomTable<Pcg32>, ConnectionId, ConnectionId) {
        let mut t = table(seed);
        let (a, b) = (ConnectionId::new(), ConnectionId::new());
        join(&mut t, a, "ann");
        join(&mut t, b, "bob");
        upload(&mut t, a, "a.mp3", chart(1.0));
        upload(&mut t, b, "b.mp3", chart(2.0));
        (t, a, b)
    }

    #[test]
    fn test_join_broadcasts_and_requests_songs() {
        let mut t = table(1);
        let (a, b) = (ConnectionId::new(), ConnectionId::new());

        let out = join(&mut t, a, "ann");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, vec![a]);
        assert!(matches!(&out[0].message, ServerMessage::PlayerList(p) if p.len() == 1));

        let out = join(&mut t, b, "bob");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].to, vec![a, b]);
        assert_eq!(
            out[0].message,
            ServerMessage::PlayerList(vec![
                PlayerSummary {
                    username: "ann".into(),
                    score: 0,
                    health: 100
                },
                PlayerSummary {
                    username: "bob".into(),
                    score: 0,
                    health: 100
                },
            ])
        );
        assert_eq!(out[1].message, ServerMessage::RequestSongs);
    }

    #[test]
    fn test_third_player_refused() {
        let mut t = table(1);
        let (a, b, c) = (ConnectionId::new(), ConnectionId::new(), ConnectionId::new());
        join(&mut t, a, "ann");
        join(&mut t, b, "bob");
        let out = join(&mut t, c, "cat");
        assert_eq!(
            out,
            vec![Outbound {
                to: vec![c],
                message: ServerMessage::RoomFull
            }]
        );
        assert_eq!(t.room("r").unwrap().player_count(), 2);

        // Rejoining an occupied seat doesn't re-request songs
        let out = join(&mut t, a, "ann2");
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_upload_opens_vote() {
        let mut t = table(1);
        let (a, b) = (ConnectionId::new(), ConnectionId::new());
        join(&mut t, a, "ann");
        join(&mut t, b, "bob");

        assert!(upload(&mut t, a, "a.mp3", chart(1.0)).is_empty());
        let out = upload(&mut t, b, "b.mp3", chart(2.0));
        assert_eq!(
            out[0].message,
            ServerMessage::StartSongVote(vec![
                SongChoice {
                    id: a.to_string(),
                    filename: "a.mp3".into()
                },
                SongChoice {
                    id: b.to_string(),
                    filename: "b.mp3".into()
                },
            ])
        );
    }

    #[test]
    fn test_matching_votes_win() {
        let (mut t, a, b) = seeded_room(9);
        assert!(vote(&mut t, a, &b.to_string()).is_empty());
        let out = vote(&mut t, b, &b.to_string());
        assert_eq!(out[0].message, ServerMessage::SongSelected(chart(2.0)));
        assert_eq!(out[0].to, vec![a, b]);
    }

    #[test]
    fn test_split_vote_picks_one_of_two() {
        let mut winners = std::collections::HashSet::new();
        for seed in 0..64 {
            let (mut t, a, b) = seeded_room(seed);
            vote(&mut t, a, &a.to_string());
            let out = vote(&mut t, b, &b.to_string());
            match &out[0].message {
                ServerMessage::SongSelected(notes) => {
                    assert!(*notes == chart(1.0) || *notes == chart(2.0));
                    winners.insert(notes.notes()[0].time.to_bits());
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        // Both outcomes occur across seeds
        assert_eq!(winners.len(), 2);
    }

    #[test]
    fn test_vote_for_missing_song_dropped() {
        let (mut t, a, b) = seeded_room(1);
        vote(&mut t, a, "ghost");
        assert!(vote(&mut t, b, "ghost").is_empty());
    }

    #[test]
    fn test_difficulty_average() {
        let (mut t, a, b) = seeded_room(1);
        assert!(speed(&mut t, a, 2.0).is_empty());
        let out = speed(&mut t, b, 4.0);
        assert_eq!(out[0].message, ServerMessage::StartGame(3.0));
        assert!(speed(&mut t, a, f64::NAN).is_empty());
    }

    #[test]
    fn test_score_update_mirrors_to_opponent_only() {
        let (mut t, a, b) = seeded_room(1);
        let out = t.handle(
            a,
            ClientMessage::ScoreUpdate {
                room: "r".into(),
                score: 300,
                health: 96,
            },
        );
        assert_eq!(
            out,
            vec![Outbound {
                to: vec![b],
                message: ServerMessage::OpponentUpdate {
                    score: 300,
                    health: 96
                }
            }]
        );
        assert_eq!(t.room("r").unwrap().player(a).unwrap().score, 300);
    }

    #[test]
    fn test_unknown_room_and_outsiders_ignored() {
        let (mut t, a, _b) = seeded_room(1);
        let out = t.handle(
            a,
            ClientMessage::VoteSong {
                room: "nope".into(),
                song_id: "x".into(),
            },
        );
        assert!(out.is_empty());

        let stranger = ConnectionId::new();
        assert!(speed(&mut t, stranger, 2.0).is_empty());
        assert_eq!(t.room("r").unwrap().difficulty_count(), 0);
    }

    #[test]
    fn test_disconnect_keeps_others_state() {
        let (mut t, a, b) = seeded_room(1);
        vote(&mut t, b, &b.to_string());
        speed(&mut t, b, 4.0);
        t.handle(
            b,
            ClientMessage::ScoreUpdate {
                room: "r".into(),
                score: 500,
                health: 80,
            },
        );

        let out = t.disconnect(a);
        assert_eq!(
            out,
            vec![Outbound {
                to: vec![b],
                message: ServerMessage::PlayerLeft
            }]
        );

        let room = t.room("r").unwrap();
        assert!(!room.contains(a));
        assert_eq!(room.player(b).unwrap().score, 500);
        assert_eq!(room.vote_count(), 1);
        assert_eq!(room.difficulty_count(), 1);
        assert_eq!(room.song_count(), 2);
    }

    #[test]
    fn test_replacement_player_gets_two_choice_ballot() {
        let (mut t, a, b) = seeded_room(3);
        vote(&mut t, a, &a.to_string());
        speed(&mut t, a, 8.0);
        t.disconnect(a);

        let c = ConnectionId::new();
        let out = join(&mut t, c, "cat");
        assert!(out.iter().any(|o| o.message == ServerMessage::RequestSongs));

        // Only b's chart is seated so far
        let out = upload(&mut t, b, "b2.mp3", chart(2.5));
        assert!(out.is_empty());

        let out = upload(&mut t, c, "c.mp3", chart(3.0));
        assert_eq!(
            out[0].message,
            ServerMessage::StartSongVote(vec![
                SongChoice {
                    id: b.to_string(),
                    filename: "b2.mp3".into()
                },
                SongChoice {
                    id: c.to_string(),
                    filename: "c.mp3".into()
                },
            ])
        );
        assert_eq!(out[0].to, vec![b, c]);

        // a's leftover vote and speed don't count
        assert!(vote(&mut t, b, &c.to_string()).is_empty());
        let out = vote(&mut t, c, &c.to_string());
        assert_eq!(out[0].message, ServerMessage::SongSelected(chart(3.0)));

        assert!(speed(&mut t, b, 2.0).is_empty());
        let out = speed(&mut t, c, 4.0);
        assert_eq!(out[0].message, ServerMessage::StartGame(3.0));

        // A vote for the departed player's chart finds nothing
        vote(&mut t, b, &a.to_string());
        assert!(vote(&mut t, c, &a.to_string()).is_empty());
    }

    #[test]
    fn test_empty_room_torn_down() {
        let (mut t, a, b) = seeded_room(1);
        t.disconnect(a);
        assert!(t.disconnect(b).is_empty());
        assert_eq!(t.room_count(), 0);
        // Unknown connection is a no-op
        assert!(t.disconnect(ConnectionId::new()).is_empty());
    }
}
