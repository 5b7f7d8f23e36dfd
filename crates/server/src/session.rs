//! Authoritative game session.
//!
//! A session owns a single lock around its whole state (board, clock and
//! lifecycle), so the two seats' workers and the clock task are serialized.
//! Every way a game can end goes through [`SessionState::finalize`], which
//! only acts while the session is `Active`: the first finalizer wins and
//! every later attempt is a no-op.

use chess_core::game_data::{GameData, GameMetadata, MoveRecord};
use chess_core::pgn;
use chess_core::rules::{Board, Terminal};
use chrono::{DateTime, Utc};
use serde::Serialize;
use shakmaty::{Color, Square};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::clock::{self, ClockState};
use crate::error::GameError;
use crate::protocol::{SeatOutcome, ServerFrame};
use crate::seat::{Player, Seat};

pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "seat")]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
    /// The given seat left mid-game.
    Abandoned(Seat),
}

impl GameResult {
    pub fn winner(color: Color) -> Self {
        match color {
            Color::White => GameResult::WhiteWins,
            Color::Black => GameResult::BlackWins,
        }
    }

    /// Result as seen from `seat`.
    pub fn outcome_for(self, seat: Seat) -> SeatOutcome {
        match self {
            GameResult::Draw => SeatOutcome::Draw,
            GameResult::WhiteWins | GameResult::BlackWins => {
                let white_won = self == GameResult::WhiteWins;
                if white_won == (seat.color() == Color::White) {
                    SeatOutcome::Win
                } else {
                    SeatOutcome::Lose
                }
            }
            GameResult::Abandoned(leaver) if leaver == seat => SeatOutcome::Lose,
            GameResult::Abandoned(_) => SeatOutcome::OpponentLeft,
        }
    }

    /// PGN result tag.
    pub fn pgn_result(self) -> &'static str {
        match self {
            GameResult::WhiteWins | GameResult::Abandoned(Seat::B) => "1-0",
            GameResult::BlackWins | GameResult::Abandoned(Seat::A) => "0-1",
            GameResult::Draw => "1/2-1/2",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    Timeout,
    Abandonment,
    Moderator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    Active,
    Finished,
}

/// What a successful move did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Continue,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running,
    /// A flag fell and this tick finalized the session.
    Expired,
    /// The session is no longer active; the clock task should exit.
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatLine {
    pub at: DateTime<Utc>,
    pub sender: String,
    pub text: String,
}

/// Read-only view for the moderation surface.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub white: Option<String>,
    pub black: Option<String>,
    pub time_control: u32,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub move_count: usize,
    /// Remaining seconds `[white, black]` for timed active games.
    pub clock: Option<[u64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<GameResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FinishReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionTranscript {
    #[serde(flatten)]
    pub summary: SessionSummary,
    pub moves: Vec<MoveRecord>,
    pub chat: Vec<ChatLine>,
    pub pgn: Option<String>,
}

pub(crate) struct ActiveGame {
    seat_a: Player,
    seat_b: Player,
    board: Board,
    clock: Option<ClockState>,
    moves: Vec<MoveRecord>,
    transcript: Vec<ChatLine>,
}

impl ActiveGame {
    fn player(&self, seat: Seat) -> &Player {
        match seat {
            Seat::A => &self.seat_a,
            Seat::B => &self.seat_b,
        }
    }

    fn broadcast(&self, frame: &ServerFrame) {
        self.seat_a.outbox.send(frame.clone());
        self.seat_b.outbox.send(frame.clone());
    }

    fn game_data(&self, result: &str, time_control: u32, started: DateTime<Utc>) -> GameData {
        GameData {
            metadata: GameMetadata {
                white: self.seat_a.nickname.clone(),
                black: self.seat_b.nickname.clone(),
                result: result.to_string(),
                date: Some(started.format("%Y.%m.%d").to_string()),
                time_control,
            },
            moves: self.moves.clone(),
        }
    }
}

pub(crate) enum SessionState {
    Waiting {
        seat_a: Player,
    },
    Active(ActiveGame),
    Finished {
        result: GameResult,
        reason: FinishReason,
        white: String,
        black: String,
        moves: Vec<MoveRecord>,
    },
}

impl SessionState {
    /// Transition `Active → Finished` and notify both seats. Returns false
    /// (and changes nothing) unless the session was active.
    fn finalize(
        &mut self,
        id: SessionId,
        meta: (u32, DateTime<Utc>),
        result: GameResult,
        reason: FinishReason,
        notice: Option<ServerFrame>,
    ) -> bool {
        let SessionState::Active(game) = self else {
            return false;
        };

        for seat in [Seat::A, Seat::B] {
            let outbox = &game.player(seat).outbox;
            if let Some(frame) = &notice {
                outbox.send(frame.clone());
            }
            outbox.send(ServerFrame::GameOver(result.outcome_for(seat)));
            outbox.close();
        }

        let (time_control, started) = meta;
        tracing::info!(
            session_id = id,
            white = %game.seat_a.nickname,
            black = %game.seat_b.nickname,
            ?result,
            ?reason,
            moves = game.moves.len(),
            "Game finished"
        );
        tracing::debug!(
            session_id = id,
            "{}",
            pgn::render_pgn(&game.game_data(result.pgn_result(), time_control, started))
        );

        let white = game.seat_a.nickname.clone();
        let black = game.seat_b.nickname.clone();
        let moves = std::mem::take(&mut game.moves);
        *self = SessionState::Finished {
            result,
            reason,
            white,
            black,
            moves,
        };
        true
    }

    /// Resolve a fallen flag. The caller has just charged the clock.
    fn time_out(&mut self, id: SessionId, meta: (u32, DateTime<Utc>)) -> bool {
        let SessionState::Active(game) = self else {
            return false;
        };
        let Some(clock) = &game.clock else {
            return false;
        };
        let to_move = game.board.turn();
        let Some(expired) = clock.expired(to_move) else {
            return false;
        };
        let result = clock::resolve_timeout(&game.board, clock, expired);
        self.finalize(
            id,
            meta,
            result,
            FinishReason::Timeout,
            Some(ServerFrame::Timeout(expired)),
        )
    }
}

pub struct GameSession {
    id: SessionId,
    time_control: u32,
    created_at: DateTime<Utc>,
    state: Mutex<SessionState>,
}

impl GameSession {
    /// New `Waiting` session with `seat_a` as its first seat.
    pub fn new(id: SessionId, seat_a: Player) -> Self {
        Self {
            id,
            time_control: seat_a.time_control,
            created_at: Utc::now(),
            state: Mutex::new(SessionState::Waiting { seat_a }),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn time_control(&self) -> u32 {
        self.time_control
    }

    pub fn is_timed(&self) -> bool {
        self.time_control > 0
    }

    fn meta(&self) -> (u32, DateTime<Utc>) {
        (self.time_control, self.created_at)
    }

    pub async fn status(&self) -> SessionStatus {
        match &*self.state.lock().await {
            SessionState::Waiting { .. } => SessionStatus::Waiting,
            SessionState::Active(_) => SessionStatus::Active,
            SessionState::Finished { .. } => SessionStatus::Finished,
        }
    }

    /// Bind `seat_b` and start the game: `Waiting → Active`, exactly once.
    /// Hands the player back if the session is no longer waiting.
    pub async fn activate(&self, seat_b: Player) -> Result<(), Player> {
        let mut state = self.state.lock().await;
        let SessionState::Waiting { seat_a } = &*state else {
            return Err(seat_b);
        };

        let clock = self
            .is_timed()
            .then(|| ClockState::new(self.time_control, Instant::now()));
        let game = ActiveGame {
            seat_a: seat_a.clone(),
            seat_b,
            board: Board::new(),
            clock,
            moves: Vec::new(),
            transcript: Vec::new(),
        };

        game.seat_a.outbox.send(ServerFrame::Start(Seat::A.color()));
        game.seat_b.outbox.send(ServerFrame::Start(Seat::B.color()));
        if let Some(clock) = &game.clock {
            game.broadcast(&clock.snapshot());
        }

        tracing::info!(
            session_id = self.id,
            white = %game.seat_a.nickname,
            black = %game.seat_b.nickname,
            time_control = self.time_control,
            "Game started"
        );
        *state = SessionState::Active(game);
        Ok(())
    }

    /// Validate, apply and relay one move from `seat`.
    pub async fn submit_move(&self, seat: Seat, token: &str) -> Result<Progress, GameError> {
        let mut state = self.state.lock().await;
        let SessionState::Active(game) = &mut *state else {
            return Err(GameError::NotActive);
        };
        if game.board.turn() != seat.color() {
            return Err(GameError::NotYourTurn);
        }
        let mv = game.board.parse_move(token)?;

        // The mover pays for their thinking time before the move lands.
        let mut fallen_at = None;
        if let Some(clock) = game.clock.as_mut() {
            clock.charge(seat.color(), Instant::now());
            if clock.expired(seat.color()).is_some() {
                fallen_at = Some(clock.snapshot());
            }
        }
        if let Some(snapshot) = fallen_at {
            game.broadcast(&snapshot);
            state.time_out(self.id, self.meta());
            return Ok(Progress::Finished);
        }

        let san = game.board.apply(mv);
        tracing::debug!(session_id = self.id, ?seat, token, san = %san, "Move applied");
        game.moves.push(MoveRecord {
            uci: token.to_string(),
            san,
        });
        game.player(seat.other())
            .outbox
            .send(ServerFrame::Move(token.to_string()));

        if let Some(terminal) = game.board.terminal() {
            let (result, reason) = match terminal {
                Terminal::Checkmate { winner } => (GameResult::winner(winner), FinishReason::Checkmate),
                Terminal::Stalemate => (GameResult::Draw, FinishReason::Stalemate),
                Terminal::InsufficientMaterial => {
                    (GameResult::Draw, FinishReason::InsufficientMaterial)
                }
            };
            state.finalize(self.id, self.meta(), result, reason, None);
            return Ok(Progress::Finished);
        }

        if let Some(clock) = &game.clock {
            game.broadcast(&clock.snapshot());
        }
        Ok(Progress::Continue)
    }

    /// Legal destinations from `square` for `seat`. Empty when it is not the
    /// seat's turn or the square does not hold one of the seat's pieces.
    pub async fn query_moves(&self, seat: Seat, square: &str) -> Vec<Square> {
        let state = self.state.lock().await;
        let SessionState::Active(game) = &*state else {
            return Vec::new();
        };
        if game.board.turn() != seat.color() {
            return Vec::new();
        }
        let Ok(square) = square.trim().parse::<Square>() else {
            return Vec::new();
        };
        if game.board.color_at(square) != Some(seat.color()) {
            return Vec::new();
        }
        game.board.destinations_from(square)
    }

    /// Forward chat to the other seat and record it in the transcript.
    pub async fn relay_chat(&self, seat: Seat, text: &str) -> Result<(), GameError> {
        let mut state = self.state.lock().await;
        let SessionState::Active(game) = &mut *state else {
            return Err(GameError::NotActive);
        };

        let sender = game.player(seat).nickname.clone();
        game.transcript.push(ChatLine {
            at: Utc::now(),
            sender: sender.clone(),
            text: text.to_string(),
        });

        let recipient = game.player(seat.other());
        let delivered = recipient.outbox.send(ServerFrame::Chat {
            sender,
            text: text.to_string(),
        });
        if !delivered {
            tracing::warn!(
                session_id = self.id,
                recipient = %recipient.nickname,
                "Chat delivery failed"
            );
        }
        Ok(())
    }

    /// One clock tick: charge, broadcast, and resolve a fallen flag.
    pub async fn tick(&self, now: Instant) -> TickOutcome {
        let mut state = self.state.lock().await;
        let SessionState::Active(game) = &mut *state else {
            return TickOutcome::Stopped;
        };
        let to_move = game.board.turn();
        let Some(clock) = game.clock.as_mut() else {
            return TickOutcome::Stopped;
        };

        clock.charge(to_move, now);
        let snapshot = clock.snapshot();
        let flag_fell = clock.expired(to_move).is_some();
        game.broadcast(&snapshot);

        if flag_fell && state.time_out(self.id, self.meta()) {
            TickOutcome::Expired
        } else {
            TickOutcome::Running
        }
    }

    /// Seat `leaver` disconnected from an active game.
    pub async fn abandon(&self, leaver: Seat) -> bool {
        let mut state = self.state.lock().await;
        state.finalize(
            self.id,
            self.meta(),
            GameResult::Abandoned(leaver),
            FinishReason::Abandonment,
            None,
        )
    }

    /// Moderator override; bypasses the board entirely.
    pub async fn force_result(&self, result: GameResult) -> bool {
        let mut state = self.state.lock().await;
        state.finalize(self.id, self.meta(), result, FinishReason::Moderator, None)
    }

    pub async fn summary(&self) -> SessionSummary {
        let state = self.state.lock().await;
        self.summarize(&state)
    }

    pub async fn transcript(&self) -> SessionTranscript {
        let state = self.state.lock().await;
        let summary = self.summarize(&state);
        let (moves, chat, pgn) = match &*state {
            SessionState::Waiting { .. } => (Vec::new(), Vec::new(), None),
            SessionState::Active(game) => {
                let data = game.game_data("*", self.time_control, self.created_at);
                (
                    game.moves.clone(),
                    game.transcript.clone(),
                    Some(pgn::render_pgn(&data)),
                )
            }
            SessionState::Finished { moves, .. } => (moves.clone(), Vec::new(), None),
        };
        SessionTranscript {
            summary,
            moves,
            chat,
            pgn,
        }
    }

    fn summarize(&self, state: &SessionState) -> SessionSummary {
        let mut summary = SessionSummary {
            id: self.id,
            white: None,
            black: None,
            time_control: self.time_control,
            status: SessionStatus::Waiting,
            created_at: self.created_at,
            move_count: 0,
            clock: None,
            result: None,
            reason: None,
        };
        match state {
            SessionState::Waiting { seat_a } => {
                summary.white = Some(seat_a.nickname.clone());
            }
            SessionState::Active(game) => {
                summary.status = SessionStatus::Active;
                summary.white = Some(game.seat_a.nickname.clone());
                summary.black = Some(game.seat_b.nickname.clone());
                summary.move_count = game.moves.len();
                summary.clock = game.clock.as_ref().map(ClockState::remaining_secs);
            }
            SessionState::Finished {
                result,
                reason,
                white,
                black,
                moves,
            } => {
                summary.status = SessionStatus::Finished;
                summary.white = Some(white.clone());
                summary.black = Some(black.clone());
                summary.move_count = moves.len();
                summary.result = Some(*result);
                summary.reason = Some(*reason);
            }
        }
        summary
    }

    #[cfg(test)]
    pub(crate) async fn set_board(&self, board: Board) {
        if let SessionState::Active(game) = &mut *self.state.lock().await {
            game.board = board;
        }
    }
}
