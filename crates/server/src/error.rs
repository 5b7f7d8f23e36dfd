use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chess_core::rules::MoveError;
use serde_json::json;

use crate::session::SessionId;

/// Handshake rejections. The connection is closed, never enqueued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeError {
    #[error("Empty handshake")]
    EmptyHandshake,

    #[error("Nickname must not be empty")]
    EmptyNickname,

    #[error("Nickname must be at most {0} characters")]
    NicknameTooLong(usize),

    #[error("Nickname can only contain letters, numbers, and underscores")]
    NicknameCharset,

    #[error("Nickname not allowed")]
    NicknameBlocked,

    #[error("Invalid time control: {0}")]
    InvalidTimeControl(String),
}

/// An inbound line that could not be turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("Frame too long")]
    TooLong,

    #[error("Invalid frame encoding")]
    Encoding,
}

/// Per-request rejections. Reported to the sender only; never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Game not active")]
    NotActive,

    #[error("Not your turn")]
    NotYourTurn,

    #[error("Invalid move format")]
    MoveFormat,

    #[error("Illegal move")]
    IllegalMove,

    #[error("{0}")]
    Protocol(String),
}

impl From<MoveError> for GameError {
    fn from(e: MoveError) -> Self {
        match e {
            MoveError::Format => GameError::MoveFormat,
            MoveError::Illegal => GameError::IllegalMove,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModerationError {
    #[error("Session {0} not found")]
    NotFound(SessionId),

    #[error("Session {0} is not active")]
    NotActive(SessionId),
}

/// Errors returned by the moderation HTTP surface.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),
}

impl From<ModerationError> for AppError {
    fn from(e: ModerationError) -> Self {
        match e {
            ModerationError::NotFound(_) => AppError::NotFound(e.to_string()),
            ModerationError::NotActive(_) => AppError::Conflict(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        };

        (status, Json(json!({ "detail": message }))).into_response()
    }
}
