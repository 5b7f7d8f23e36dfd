//! Line protocol: pipe-delimited frames, one per line.
//!
//! Inbound lines are parsed exactly once into a [`ClientFrame`]; outbound
//! frames are only ever produced by formatting a [`ServerFrame`].

use std::fmt;

use shakmaty::{Color, Square};

use crate::error::GameError;

/// Time controls a handshake may request, in seconds per side.
pub const ALLOWED_TIME_CONTROLS: [u32; 6] = [0, 60, 180, 300, 600, 1200];

pub fn is_allowed_time_control(secs: u32) -> bool {
    ALLOWED_TIME_CONTROLS.contains(&secs)
}

pub fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "WHITE",
        Color::Black => "BLACK",
    }
}

/// Client → Server frames after the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// Coordinate move token, e.g. `e2e4` or `e7e8q`.
    Move(String),
    /// `MOVES|<square>`
    QueryMoves(String),
    /// `CHAT|<text>`; the text may itself contain pipes.
    Chat(String),
}

impl ClientFrame {
    /// Parse one inbound line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, GameError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Ok(None);
        }

        let Some((command, rest)) = line.split_once('|') else {
            return Ok(Some(ClientFrame::Move(line.trim().to_string())));
        };

        match command {
            "MOVES" => Ok(Some(ClientFrame::QueryMoves(rest.trim().to_string()))),
            "CHAT" => {
                if rest.trim().is_empty() {
                    Err(GameError::Protocol("Empty chat message".into()))
                } else {
                    Ok(Some(ClientFrame::Chat(rest.to_string())))
                }
            }
            other => Err(GameError::Protocol(format!("Unknown command: {}", other))),
        }
    }
}

/// Seat-relative game result carried by `GAMEOVER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatOutcome {
    Win,
    Lose,
    Draw,
    OpponentLeft,
}

impl SeatOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            SeatOutcome::Win => "WIN",
            SeatOutcome::Lose => "LOSE",
            SeatOutcome::Draw => "DRAW",
            SeatOutcome::OpponentLeft => "OPPONENT_LEFT",
        }
    }
}

/// Server → Client frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    Start(Color),
    Error(String),
    /// Opponent's move, relayed verbatim.
    Move(String),
    Moves(Vec<Square>),
    Time { white: u64, black: u64 },
    Timeout(Color),
    GameOver(SeatOutcome),
    Chat { sender: String, text: String },
}

impl fmt::Display for ServerFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerFrame::Start(color) => write!(f, "START|{}", color_name(*color)),
            ServerFrame::Error(message) => write!(f, "ERROR|{}", message),
            ServerFrame::Move(token) => f.write_str(token),
            ServerFrame::Moves(squares) => {
                let csv: Vec<String> = squares.iter().map(|s| s.to_string()).collect();
                write!(f, "MOVES|{}", csv.join(","))
            }
            ServerFrame::Time { white, black } => write!(f, "TIME|{}|{}", white, black),
            ServerFrame::Timeout(color) => write!(f, "TIMEOUT|{}", color_name(*color)),
            ServerFrame::GameOver(outcome) => write!(f, "GAMEOVER|{}", outcome.as_str()),
            ServerFrame::Chat { sender, text } => write!(f, "CHAT|{}|{}", sender, text),
        }
    }
}
