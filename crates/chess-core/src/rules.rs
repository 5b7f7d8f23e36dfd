//! Rules engine: the authoritative board, backed by shakmaty.
//!
//! Everything the session server needs to know about chess goes through
//! [`Board`]: parsing long coordinate (UCI) tokens, legality, applying moves,
//! terminal classification and the insufficient-material predicate.

use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, Move, Position, Square};

/// Why a move token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("Invalid move format")]
    Format,

    #[error("Illegal move")]
    Illegal,
}

/// How a game ended on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Checkmate { winner: Color },
    Stalemate,
    InsufficientMaterial,
}

/// Authoritative position for one game.
#[derive(Debug, Clone, Default)]
pub struct Board {
    pos: Chess,
}

impl Board {
    /// Standard starting position.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a board from a FEN string (used for setups and tests).
    pub fn from_fen(fen: &str) -> Result<Self, String> {
        let fen: Fen = fen
            .parse()
            .map_err(|e| format!("Invalid FEN '{}': {}", fen, e))?;
        let pos: Chess = fen
            .into_position(CastlingMode::Standard)
            .map_err(|e| format!("Invalid position: {}", e))?;
        Ok(Self { pos })
    }

    /// Side to move.
    pub fn turn(&self) -> Color {
        self.pos.turn()
    }

    /// Parse a UCI token and resolve it against the current position.
    ///
    /// `Format` means the token is not coordinate notation at all; `Illegal`
    /// means it parsed but is not in the legal move set (wrong piece, empty
    /// origin, leaves the king in check, ...).
    pub fn parse_move(&self, token: &str) -> Result<Move, MoveError> {
        let uci: UciMove = token.trim().parse().map_err(|_| MoveError::Format)?;
        let mv = uci.to_move(&self.pos).map_err(|_| MoveError::Illegal)?;
        if !self.pos.is_legal(mv.clone()) {
            return Err(MoveError::Illegal);
        }
        Ok(mv)
    }

    /// Play a move already validated by [`Board::parse_move`] and return its
    /// SAN, computed on the position before the move.
    pub fn apply(&mut self, mv: Move) -> String {
        let san = San::from_move(&self.pos, mv.clone()).to_string();
        self.pos.play_unchecked(mv);
        san
    }

    /// Color of the piece on `square`, if any.
    pub fn color_at(&self, square: Square) -> Option<Color> {
        self.pos.board().color_at(square)
    }

    /// Destination squares of every legal move starting on `from`, sorted and
    /// de-duplicated. Castling is reported with the king's UCI destination.
    pub fn destinations_from(&self, from: Square) -> Vec<Square> {
        let mut squares: Vec<Square> = self
            .pos
            .legal_moves()
            .iter()
            .filter(|m| m.from() == Some(from))
            .filter_map(|m| match m.to_uci(CastlingMode::Standard) {
                UciMove::Normal { to, .. } => Some(to),
                _ => None,
            })
            .collect();
        squares.sort();
        squares.dedup();
        squares
    }

    /// Terminal state of the position, if the game is over on the board.
    pub fn terminal(&self) -> Option<Terminal> {
        if self.pos.is_checkmate() {
            Some(Terminal::Checkmate {
                winner: !self.pos.turn(),
            })
        } else if self.pos.is_stalemate() {
            Some(Terminal::Stalemate)
        } else if self.pos.is_insufficient_material() {
            Some(Terminal::InsufficientMaterial)
        } else {
            None
        }
    }

    /// True when `color` can never deliver mate with what it has left.
    pub fn has_insufficient_material(&self, color: Color) -> bool {
        self.pos.has_insufficient_material(color)
    }

    /// Piece placement part of the FEN plus side to move.
    pub fn placement(&self) -> String {
        let side = match self.pos.turn() {
            Color::White => "w",
            Color::Black => "b",
        };
        format!("{} {}", self.pos.board(), side)
    }
}
