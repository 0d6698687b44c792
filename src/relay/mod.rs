//! Two-player relay
//!
//! `protocol` is shared by the browser client and the server. Room logic and
//! the socket server only build natively.

pub mod protocol;
#[cfg(not(target_arch = "wasm32"))]
pub mod room;
#[cfg(not(target_arch = "wasm32"))]
pub mod server;

pub use protocol::{ClientMessage, PlayerSummary, ServerMessage, SongChoice};
#[cfg(not(target_arch = "wasm32"))]
pub use room::{ConnectionId, Outbound, Room, RoomTable};
#[cfg(not(target_arch = "wasm32"))]
pub use server::RelayServer;
