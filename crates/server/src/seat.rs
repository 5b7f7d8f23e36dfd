//! Seats, players, and the outbound half of a connection.

use serde::{Deserialize, Serialize};
use shakmaty::Color;
use tokio::sync::mpsc;

use crate::protocol::ServerFrame;

/// One of the two player slots in a session. Seat A is always the first
/// registered player and plays White.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Seat {
    A,
    B,
}

impl Seat {
    pub fn color(self) -> Color {
        match self {
            Seat::A => Color::White,
            Seat::B => Color::Black,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Seat::A => Seat::B,
            Seat::B => Seat::A,
        }
    }
}

/// Message for a connection's writer task.
#[derive(Debug)]
pub enum Outbound {
    Frame(ServerFrame),
    /// Flush what is queued, then close the connection.
    Close,
}

/// Sending side of a connection. Sends never block; they fail once the
/// writer task has exited.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a frame. Returns false if the connection is already gone.
    pub fn send(&self, frame: ServerFrame) -> bool {
        self.tx.send(Outbound::Frame(frame)).is_ok()
    }

    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }

    /// Resolves once the writer task has exited.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// A validated player bound to a live connection.
#[derive(Debug, Clone)]
pub struct Player {
    pub nickname: String,
    pub time_control: u32,
    pub outbox: Outbox,
}

impl Player {
    pub fn new(nickname: impl Into<String>, time_control: u32, outbox: Outbox) -> Self {
        Self {
            nickname: nickname.into(),
            time_control,
            outbox,
        }
    }
}
