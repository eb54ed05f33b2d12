pub mod extract;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::interview::handlers;
use crate::state::AppState;
use crate::video::handlers as video;
use crate::video::MAX_VIDEO_BYTES;

/// Headroom for multipart boundaries and the id fields around the video part.
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

/// Success body: `{"success": true, ...payload}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/features", get(health::features_handler))
        // Questions
        .route(
            "/api/questions/generate",
            post(handlers::handle_generate_questions),
        )
        .route("/api/questions", get(handlers::handle_list_questions))
        // Sessions
        .route("/api/sessions/create", post(handlers::handle_create_session))
        .route("/api/sessions", get(handlers::handle_list_sessions))
        .route("/api/sessions/:id", get(handlers::handle_get_session))
        .route(
            "/api/sessions/:id/results",
            get(handlers::handle_session_results),
        )
        // Answers
        .route(
            "/api/responses/evaluate",
            post(handlers::handle_evaluate_response),
        )
        .route("/api/responses/:id", get(handlers::handle_get_response))
        .route("/api/clarification", post(handlers::handle_clarification))
        // Videos
        .route(
            "/api/videos/upload",
            post(video::handle_upload_video)
                .get(video::handle_get_video)
                .layer(DefaultBodyLimit::max(MAX_VIDEO_BYTES + UPLOAD_OVERHEAD_BYTES)),
        )
        .route(
            "/api/videos/cleanup",
            post(video::handle_cleanup_videos).get(video::handle_cleanup_expired),
        )
        .route("/api/videos/usage", get(video::handle_video_usage))
        .with_state(state)
}
