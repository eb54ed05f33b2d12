use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service status, version and the active storage backend.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "coach-api",
        "storage": state.repo.backend(),
    }))
}

/// GET /api/features
/// Feature switches the client uses to show or hide the video flow.
pub async fn features_handler(State(state): State<AppState>) -> Json<Value> {
    let features = state.features;
    Json(json!({
        "success": true,
        "features": {
            "videoRecording": features.video_recording,
            "videoStorage": features.video_storage,
            "videoPlayback": features.video_playback,
        }
    }))
}
