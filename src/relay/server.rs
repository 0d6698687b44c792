//! WebSocket relay
//!
//! One coordinator task owns the room table and every connection's outbox.
//! Connection tasks only parse frames and forward them as commands, so room
//! state is never shared across tasks.

use std::collections::HashMap;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use super::protocol::ClientMessage;
use super::room::{ConnectionId, Outbound, RoomTable};
use crate::error::ProtocolError;
use crate::sim::RngState;

/// Commands from connection tasks to the coordinator
#[derive(Debug)]
enum Command {
    Connect {
        id: ConnectionId,
        outbox: mpsc::UnboundedSender<String>,
    },
    Frame {
        id: ConnectionId,
        message: ClientMessage,
    },
    Disconnect {
        id: ConnectionId,
    },
}

/// Relay server bound to a TCP listener
pub struct RelayServer {
    listener: TcpListener,
    seed: u64,
}

impl RelayServer {
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .context("failed to bind relay listener")?;
        Ok(Self {
            listener,
            seed: rand::random(),
        })
    }

    /// Fix the tie-break RNG seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("listener has no local address")
    }

    /// Accept connections until the listener fails
    pub async fn run(self) -> Result<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        let table = RoomTable::new(RngState::new(self.seed).to_rng());
        tokio::spawn(coordinator_task(rx, table));

        log::info!("Relay listening on {}", self.local_addr()?);
        loop {
            let (stream, peer) = self
                .listener
                .accept()
                .await
                .context("failed to accept connection")?;
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer, tx).await {
                    log::warn!("Connection {} ended with error: {:#}", peer, e);
                }
            });
        }
    }
}

/// Owns the room table; applies commands in arrival order
async fn coordinator_task<R: Rng>(mut rx: mpsc::UnboundedReceiver<Command>, mut table: RoomTable<R>) {
    let mut outboxes: HashMap<ConnectionId, mpsc::UnboundedSender<String>> = HashMap::new();

    while let Some(cmd) = rx.recv().await {
        let out = match cmd {
            Command::Connect { id, outbox } => {
                outboxes.insert(id, outbox);
                continue;
            }
            Command::Frame { id, message } => table.handle(id, message),
            Command::Disconnect { id } => {
                outboxes.remove(&id);
                table.disconnect(id)
            }
        };
        deliver(&outboxes, out);
    }
    log::debug!("Coordinator stopped");
}

fn deliver(outboxes: &HashMap<ConnectionId, mpsc::UnboundedSender<String>>, out: Vec<Outbound>) {
    for Outbound { to, message } in out {
        let frame = match message.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Failed to encode {:?}: {}", message, e);
                continue;
            }
        };
        for id in to {
            // A closed outbox means the connection is already going away
            if let Some(outbox) = outboxes.get(&id) {
                let _ = outbox.send(frame.clone());
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    commands: mpsc::UnboundedSender<Command>,
) -> Result<()> {
    let ws = tokio_tungstenite::accept_async(stream)
        .await
        .context("WebSocket handshake failed")?;
    let (mut sink, mut source) = ws.split();

    let id = ConnectionId::new();
    log::info!("{} connected from {}", id, peer);

    let (outbox, mut inbox) = mpsc::unbounded_channel::<String>();
    commands
        .send(Command::Connect { id, outbox })
        .context("coordinator closed")?;

    let writer = tokio::spawn(async move {
        while let Some(frame) = inbox.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(msg) = source.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => {
                log::warn!("{}: {}", id, ProtocolError::Binary(bytes.len()));
                continue;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                log::debug!("{} read error: {}", id, e);
                break;
            }
        };
        match ClientMessage::from_frame(&text) {
            Ok(message) => {
                if commands.send(Command::Frame { id, message }).is_err() {
                    break;
                }
            }
            Err(e) => log::warn!("{}: {}", id, e),
        }
    }

    log::info!("{} disconnected", id);
    let _ = commands.send(Command::Disconnect { id });
    // The coordinator drops the outbox on disconnect, which ends the writer
    let _ = writer.await;
    Ok(())
}
