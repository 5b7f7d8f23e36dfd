//! Moderation HTTP surface. Read-only listing plus the two overrides.

pub mod health;
pub mod sessions;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::moderation::Moderation;

pub fn router(moderation: Moderation) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health::health_check))
        // Sessions
        .route("/api/sessions", get(sessions::list_sessions))
        .route("/api/sessions/{session_id}", get(sessions::get_session))
        .route("/api/sessions/{session_id}/draw", post(sessions::force_draw))
        .route("/api/sessions/{session_id}/forfeit", post(sessions::force_loss))
        // Shared state
        .layer(Extension(moderation))
        .layer(cors)
}
