use axum::{
    extract::{rejection::JsonRejection, Path},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::error::AppError;
use crate::moderation::Moderation;
use crate::seat::Seat;
use crate::session::{SessionId, SessionSummary, SessionTranscript};

/// Who forfeits: either `{"seat": "A"}` or `{"color": "white"}`.
#[derive(Debug, Deserialize)]
pub struct ForfeitRequest {
    pub seat: Option<Seat>,
    pub color: Option<String>,
}

impl ForfeitRequest {
    fn seat(&self) -> Result<Seat, AppError> {
        if let Some(seat) = self.seat {
            return Ok(seat);
        }
        match self.color.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("white") => Ok(Seat::A),
            Some("black") => Ok(Seat::B),
            Some(other) => Err(AppError::BadRequest(format!("Unknown color: {other}"))),
            None => Err(AppError::BadRequest("Either seat or color is required".into())),
        }
    }
}

/// GET /api/sessions
pub async fn list_sessions(
    Extension(moderation): Extension<Moderation>,
) -> Json<Vec<SessionSummary>> {
    Json(moderation.list().await)
}

/// GET /api/sessions/{session_id}
pub async fn get_session(
    Extension(moderation): Extension<Moderation>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<SessionTranscript>, AppError> {
    Ok(Json(moderation.transcript(session_id).await?))
}

/// POST /api/sessions/{session_id}/draw
pub async fn force_draw(
    Extension(moderation): Extension<Moderation>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<JsonValue>, AppError> {
    moderation.force_draw(session_id).await?;
    Ok(Json(json!({ "success": true, "result": "draw" })))
}

/// POST /api/sessions/{session_id}/forfeit
pub async fn force_loss(
    Extension(moderation): Extension<Moderation>,
    Path(session_id): Path<SessionId>,
    payload: Result<Json<ForfeitRequest>, JsonRejection>,
) -> Result<Json<JsonValue>, AppError> {
    let Json(req) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let seat = req.seat()?;

    moderation.force_loss(session_id, seat).await?;
    Ok(Json(json!({ "success": true, "loser": seat })))
}
