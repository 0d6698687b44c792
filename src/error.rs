//! Error types surfaced to the player or the relay log
//!
//! None of these are fatal: each one leaves the session where it was and the
//! player recovers by re-uploading or rejoining.

use thiserror::Error;

/// Rejected user input (no state change)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("Upload a song or video first!")]
    NoSong,
    #[error("A song is already playing.")]
    AlreadyPlaying,
}

/// Audio could not be turned into samples
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Error decoding audio: no audio track found")]
    NoTrack,
    #[error("Error decoding audio: unknown sample rate")]
    UnknownSampleRate,
    #[error("Error decoding audio: stream contained no samples")]
    Empty,
    #[error("Error decoding audio: {0}")]
    Codec(String),
}

/// A relay frame that could not be understood
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unexpected binary frame ({0} bytes)")]
    Binary(usize),
}
