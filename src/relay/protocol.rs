//! Relay wire protocol
//!
//! Every WebSocket text frame is one JSON object `{"event": name, "data":
//! payload}`. Event names and field names are camelCase.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ProtocolError;
use crate::sim::NoteSchedule;

/// Frames sent by a player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    JoinRoom {
        room: String,
        username: String,
    },
    #[serde(rename_all = "camelCase")]
    UploadSong {
        room: String,
        song_data: NoteSchedule,
        filename: String,
    },
    #[serde(rename_all = "camelCase")]
    VoteSong {
        room: String,
        song_id: String,
    },
    VoteDifficulty {
        room: String,
        #[serde(deserialize_with = "number_or_string")]
        speed: f64,
    },
    ScoreUpdate {
        room: String,
        score: i64,
        health: u8,
    },
}

impl ClientMessage {
    pub fn from_frame(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_frame(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Room the frame addresses
    pub fn room(&self) -> &str {
        match self {
            ClientMessage::JoinRoom { room, .. }
            | ClientMessage::UploadSong { room, .. }
            | ClientMessage::VoteSong { room, .. }
            | ClientMessage::VoteDifficulty { room, .. }
            | ClientMessage::ScoreUpdate { room, .. } => room,
        }
    }
}

/// Player as listed to the room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub username: String,
    pub score: i64,
    pub health: u8,
}

/// Ballot entry; `id` is the uploader's connection id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongChoice {
    pub id: String,
    pub filename: String,
}

/// Frames sent by the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    PlayerList(Vec<PlayerSummary>),
    /// Room is full; both players should upload a chart
    RequestSongs,
    StartSongVote(Vec<SongChoice>),
    /// Winning chart
    SongSelected(NoteSchedule),
    /// Agreed scroll speed
    StartGame(f64),
    OpponentUpdate {
        score: i64,
        health: u8,
    },
    PlayerLeft,
    /// Join refused, both slots taken
    RoomFull,
}

impl ServerMessage {
    pub fn from_frame(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_frame(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Speeds arrive from a text input, so accept `3` as well as `"3"`
fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
