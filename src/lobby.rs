//! Client side of the two-player room
//!
//! Mirrors the relay's gates so the page knows what to show and which frames
//! make sense to send. Fed by `ServerMessage`s; produces `ClientMessage`s.

use crate::relay::{ClientMessage, PlayerSummary, ServerMessage, SongChoice};
use crate::settings::clamp_scroll_speed;
use crate::sim::{NoteSchedule, PlayerState};

/// Where this client is in the room flow
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LobbyPhase {
    #[default]
    Idle,
    /// In a room, waiting for a partner
    Joined,
    /// Both present; each uploads a chart
    AwaitingSongs,
    SongVote(Vec<SongChoice>),
    AwaitingSelection,
    DifficultyVote(NoteSchedule),
    AwaitingStart(NoteSchedule),
    Ready { speed: f64 },
    /// Room had no free slot
    Rejected,
}

/// Chart and speed both players agreed on
#[derive(Debug, Clone, PartialEq)]
pub struct MatchStart {
    pub schedule: NoteSchedule,
    pub speed: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Lobby {
    room: String,
    username: String,
    phase: LobbyPhase,
    players: Vec<PlayerSummary>,
    opponent: Option<(i64, u8)>,
    uploaded: bool,
}

impl Lobby {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &LobbyPhase {
        &self.phase
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn players(&self) -> &[PlayerSummary] {
        &self.players
    }

    /// Latest mirrored (score, health) of the other player
    pub fn opponent(&self) -> Option<(i64, u8)> {
        self.opponent
    }

    pub fn opponent_name(&self) -> Option<&str> {
        self.players
            .iter()
            .map(|p| p.username.as_str())
            .find(|name| *name != self.username)
    }

    /// A chart was offered since the room last asked for songs
    pub fn has_uploaded(&self) -> bool {
        self.uploaded
    }

    pub fn in_room(&self) -> bool {
        !matches!(self.phase, LobbyPhase::Idle | LobbyPhase::Rejected)
    }

    /// Enter a room, leaving any previous flow behind
    pub fn join(&mut self, room: &str, username: &str) -> ClientMessage {
        *self = Self {
            room: room.trim().to_string(),
            username: username.trim().to_string(),
            phase: LobbyPhase::Joined,
            ..Self::default()
        };
        ClientMessage::JoinRoom {
            room: self.room.clone(),
            username: self.username.clone(),
        }
    }

    /// Offer a chart once the room asks for songs
    pub fn upload(&mut self, filename: &str, schedule: NoteSchedule) -> Option<ClientMessage> {
        if self.phase != LobbyPhase::AwaitingSongs {
            return None;
        }
        self.uploaded = true;
        Some(ClientMessage::UploadSong {
            room: self.room.clone(),
            song_data: schedule,
            filename: filename.to_string(),
        })
    }

    /// Vote for one of the offered songs
    pub fn vote_song(&mut self, song_id: &str) -> Option<ClientMessage> {
        let LobbyPhase::SongVote(choices) = &self.phase else {
            return None;
        };
        if !choices.iter().any(|c| c.id == song_id) {
            log::debug!("Ignoring vote for unknown song {:?}", song_id);
            return None;
        }
        self.phase = LobbyPhase::AwaitingSelection;
        Some(ClientMessage::VoteSong {
            room: self.room.clone(),
            song_id: song_id.to_string(),
        })
    }

    /// Propose a scroll speed for the selected chart
    pub fn vote_difficulty(&mut self, speed: f64) -> Option<ClientMessage> {
        if !speed.is_finite() || !matches!(self.phase, LobbyPhase::DifficultyVote(_)) {
            return None;
        }
        if let LobbyPhase::DifficultyVote(schedule) = std::mem::take(&mut self.phase) {
            self.phase = LobbyPhase::AwaitingStart(schedule);
        }
        Some(ClientMessage::VoteDifficulty {
            room: self.room.clone(),
            speed,
        })
    }

    /// Frame reporting our totals to the opponent
    pub fn score_update(&self, player: &PlayerState) -> Option<ClientMessage> {
        self.in_room().then(|| ClientMessage::ScoreUpdate {
            room: self.room.clone(),
            score: player.score,
            health: player.health,
        })
    }

    /// Apply a relay frame. Returns the match to start when the last gate opens.
    pub fn apply(&mut self, message: ServerMessage) -> Option<MatchStart> {
        if !self.in_room() {
            return None;
        }

        match message {
            ServerMessage::PlayerList(players) => self.players = players,
            ServerMessage::RequestSongs if self.phase == LobbyPhase::Joined => {
                self.phase = LobbyPhase::AwaitingSongs;
            }
            ServerMessage::StartSongVote(choices) if self.phase == LobbyPhase::AwaitingSongs => {
                self.phase = LobbyPhase::SongVote(choices);
            }
            ServerMessage::SongSelected(schedule) if self.phase == LobbyPhase::AwaitingSelection => {
                self.phase = LobbyPhase::DifficultyVote(schedule.fresh());
            }
            ServerMessage::StartGame(speed) if matches!(self.phase, LobbyPhase::AwaitingStart(_)) => {
                let speed = clamp_scroll_speed(speed);
                if let LobbyPhase::AwaitingStart(schedule) =
                    std::mem::replace(&mut self.phase, LobbyPhase::Ready { speed })
                {
                    return Some(MatchStart { schedule, speed });
                }
            }
            ServerMessage::OpponentUpdate { score, health } => {
                self.opponent = Some((score, health));
            }
            ServerMessage::PlayerLeft => {
                log::info!("Opponent left room {:?}", self.room);
                let me = self.username.clone();
                self.players.retain(|p| p.username == me);
                self.opponent = None;
                self.uploaded = false;
                self.phase = LobbyPhase::Joined;
            }
            ServerMessage::RoomFull => {
                log::warn!("Room {:?} is full", self.room);
                self.phase = LobbyPhase::Rejected;
            }
            other => log::debug!("Ignoring {:?} while {:?}", other, self.phase),
        }
        None
    }

    /// One-line status for the lobby panel
    pub fn status_text(&self) -> String {
        match &self.phase {
            LobbyPhase::Idle => "Not in a room".to_string(),
            LobbyPhase::Joined => format!("In room {}, waiting for an opponent", self.room),
            LobbyPhase::AwaitingSongs if self.uploaded => {
                "Song sent, waiting for opponent's song".to_string()
            }
            LobbyPhase::AwaitingSongs => "Opponent found! Upload your song".to_string(),
            LobbyPhase::SongVote(_) => "Vote for a song".to_string(),
            LobbyPhase::AwaitingSelection => "Waiting for opponent's vote".to_string(),
            LobbyPhase::DifficultyVote(_) => "Song selected! Vote on a speed".to_string(),
            LobbyPhase::AwaitingStart(_) => "Waiting for opponent's speed".to_string(),
            LobbyPhase::Ready { speed } => format!("Starting at {}x", speed),
            LobbyPhase::Rejected => format!("Room {} is full", self.room),
        }
    }
}
