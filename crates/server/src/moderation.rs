//! Moderator overrides and the read-only session view.

use std::sync::Arc;

use crate::error::ModerationError;
use crate::registry::Registry;
use crate::seat::Seat;
use crate::session::{GameResult, GameSession, SessionId, SessionSummary, SessionTranscript};

#[derive(Clone)]
pub struct Moderation {
    registry: Arc<Registry>,
}

impl Moderation {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub async fn list(&self) -> Vec<SessionSummary> {
        self.registry.list().await
    }

    pub async fn transcript(&self, id: SessionId) -> Result<SessionTranscript, ModerationError> {
        let session = self.session(id).await?;
        Ok(session.transcript().await)
    }

    /// End the game as a draw regardless of the position.
    pub async fn force_draw(&self, id: SessionId) -> Result<(), ModerationError> {
        self.override_result(id, GameResult::Draw).await
    }

    /// `seat` loses, the other seat wins.
    pub async fn force_loss(&self, id: SessionId, seat: Seat) -> Result<(), ModerationError> {
        self.override_result(id, GameResult::winner(seat.other().color()))
            .await
    }

    async fn override_result(&self, id: SessionId, result: GameResult) -> Result<(), ModerationError> {
        let session = self.session(id).await?;
        if !session.force_result(result).await {
            return Err(ModerationError::NotActive(id));
        }
        tracing::info!(session_id = id, ?result, "Moderator override");
        self.registry.remove(id).await;
        Ok(())
    }

    async fn session(&self, id: SessionId) -> Result<Arc<GameSession>, ModerationError> {
        self.registry
            .get(id)
            .await
            .ok_or(ModerationError::NotFound(id))
    }
}
