//! Per-session chess clock and the periodic task that drives it.
//!
//! Elapsed real time between two charges is attributed entirely to the side
//! to move; the other side's clock is frozen. The same [`ClockState`] is
//! charged from the move path and from the tick task, both under the
//! session lock.

use std::sync::Arc;
use std::time::Duration;

use chess_core::rules::Board;
use shakmaty::Color;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::protocol::ServerFrame;
use crate::registry::Registry;
use crate::session::{GameResult, GameSession, TickOutcome};

#[derive(Debug, Clone)]
pub struct ClockState {
    white: Duration,
    black: Duration,
    last_tick: Instant,
}

impl ClockState {
    pub fn new(time_control: u32, now: Instant) -> Self {
        let per_side = Duration::from_secs(u64::from(time_control));
        Self {
            white: per_side,
            black: per_side,
            last_tick: now,
        }
    }

    /// Charge everything since the last charge to `to_move`, floored at zero.
    pub fn charge(&mut self, to_move: Color, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_tick);
        let remaining = match to_move {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        };
        *remaining = remaining.saturating_sub(elapsed);
        self.last_tick = now;
    }

    pub fn remaining(&self, color: Color) -> Duration {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    /// The color whose flag has fallen. When both are at zero the side to
    /// move is reported.
    pub fn expired(&self, to_move: Color) -> Option<Color> {
        if self.remaining(to_move).is_zero() {
            Some(to_move)
        } else if self.remaining(!to_move).is_zero() {
            Some(!to_move)
        } else {
            None
        }
    }

    pub fn both_expired(&self) -> bool {
        self.white.is_zero() && self.black.is_zero()
    }

    /// Remaining `[white, black]` in whole seconds, rounded up so a side
    /// only reads 0 once its flag has fallen.
    pub fn remaining_secs(&self) -> [u64; 2] {
        [ceil_secs(self.white), ceil_secs(self.black)]
    }

    /// `TIME|<white>|<black>`
    pub fn snapshot(&self) -> ServerFrame {
        let [white, black] = self.remaining_secs();
        ServerFrame::Time { white, black }
    }
}

fn ceil_secs(d: Duration) -> u64 {
    if d.subsec_nanos() > 0 {
        d.as_secs() + 1
    } else {
        d.as_secs()
    }
}

/// Result of a flag fall. Both flags down, or a winner who could never mate,
/// is a draw; otherwise the expired side loses.
pub fn resolve_timeout(board: &Board, clock: &ClockState, expired: Color) -> GameResult {
    let winner = !expired;
    if clock.both_expired() || board.has_insufficient_material(winner) {
        GameResult::Draw
    } else {
        GameResult::winner(winner)
    }
}

/// Spawn the tick task for an active timed session. The task exits when the
/// session is no longer active.
pub fn spawn(registry: Arc<Registry>, session: Arc<GameSession>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + every, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match session.tick(Instant::now()).await {
                TickOutcome::Running => {}
                TickOutcome::Expired => {
                    registry.remove(session.id()).await;
                    break;
                }
                TickOutcome::Stopped => break,
            }
        }

        tracing::debug!(session_id = session.id(), "Clock task stopped");
    })
}
