//! Axum route handlers for answer videos.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::routes::extract::{AppJson, AppMultipart, AppQuery};
use crate::routes::Envelope;
use crate::state::AppState;
use crate::video::{SessionUsage, SessionVideo, VideoStore, MAX_VIDEO_BYTES};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoQuery {
    pub session_id: Option<String>,
    pub question_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CleanupRequest {
    pub video_ids: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct VideoBody {
    pub video: SessionVideo,
}

#[derive(Debug, Serialize)]
pub struct CleanupResults {
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct CleanupBody {
    pub message: String,
    pub results: CleanupResults,
}

#[derive(Debug, Serialize)]
pub struct ExpiredCleanupBody {
    pub message: String,
    pub removed: usize,
}

#[derive(Debug, Serialize)]
pub struct UsageBody {
    pub usage: SessionUsage,
}

fn video_store(state: &AppState) -> Result<&VideoStore, AppError> {
    match (&state.videos, state.features.video_storage) {
        (Some(store), true) => Ok(store),
        _ => Err(AppError::Forbidden("Video storage is disabled".to_string())),
    }
}

fn parse_uuid(name: &str, value: Option<&str>) -> Result<Uuid, AppError> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{name} is required")))?;
    Uuid::parse_str(value).map_err(|_| AppError::Validation(format!("{name} is not a valid id")))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!(
            "Video too large. Max size: {}MB",
            MAX_VIDEO_BYTES / (1024 * 1024)
        ))
    } else {
        AppError::Validation(format!("Invalid multipart body: {}", err.body_text()))
    }
}

/// POST /api/videos/upload
///
/// Multipart fields: `sessionId`, `questionId`, `video` (a `video/*` file).
pub async fn handle_upload_video(
    State(state): State<AppState>,
    AppMultipart(mut multipart): AppMultipart,
) -> Result<Json<Envelope<VideoBody>>, AppError> {
    let store = video_store(&state)?;

    let mut session_id: Option<String> = None;
    let mut question_id: Option<String> = None;
    let mut video: Option<(Bytes, String)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "sessionId" => session_id = Some(field.text().await.map_err(multipart_error)?),
            "questionId" => question_id = Some(field.text().await.map_err(multipart_error)?),
            "video" => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let body = field.bytes().await.map_err(multipart_error)?;
                video = Some((body, content_type));
            }
            _ => {}
        }
    }

    let session_id = parse_uuid("sessionId", session_id.as_deref())?;
    let question_id = parse_uuid("questionId", question_id.as_deref())?;
    let (body, content_type) =
        video.ok_or_else(|| AppError::Validation("video file is required".to_string()))?;
    if !content_type.starts_with("video/") {
        return Err(AppError::Validation(format!(
            "File must be a video, got '{content_type}'"
        )));
    }

    let video = store
        .store_session_video(session_id, question_id, body, &content_type)
        .await?;
    Ok(Envelope::ok(VideoBody { video }))
}

/// GET /api/videos/upload?sessionId=..&questionId=..
pub async fn handle_get_video(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<VideoQuery>,
) -> Result<Json<Envelope<VideoBody>>, AppError> {
    let store = video_store(&state)?;
    let session_id = parse_uuid("sessionId", query.session_id.as_deref())?;
    let question_id = parse_uuid("questionId", query.question_id.as_deref())?;

    let video = store
        .get_session_video(session_id, question_id)
        .await
        .ok_or_else(|| AppError::NotFound("Video not found".to_string()))?;
    Ok(Envelope::ok(VideoBody { video }))
}

/// POST /api/videos/cleanup
///
/// Deletes the listed videos. Failures are counted, not fatal.
pub async fn handle_cleanup_videos(
    State(state): State<AppState>,
    AppJson(request): AppJson<CleanupRequest>,
) -> Result<Json<Envelope<CleanupBody>>, AppError> {
    let store = video_store(&state)?;
    let ids: Vec<String> = match request.video_ids {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .map(|v| match v {
                serde_json::Value::String(s) => Ok(s),
                _ => Err(AppError::Validation("videoIds must contain strings".to_string())),
            })
            .collect::<Result<_, _>>()?,
        _ => return Err(AppError::Validation("videoIds must be an array".to_string())),
    };

    let mut successful = 0;
    for id in &ids {
        match store.delete_video(id).await {
            Ok(()) => successful += 1,
            Err(e) => warn!("Failed to delete video {id}: {e}"),
        }
    }
    let failed = ids.len() - successful;
    info!("Video cleanup: {successful} deleted, {failed} failed");

    let mut message = format!("Cleaned up {successful} videos");
    if failed > 0 {
        message.push_str(&format!(", {failed} failed"));
    }
    Ok(Envelope::ok(CleanupBody {
        message,
        results: CleanupResults {
            successful,
            failed,
            total: ids.len(),
        },
    }))
}

/// GET /api/videos/cleanup
///
/// Removes every video past its expiry.
pub async fn handle_cleanup_expired(
    State(state): State<AppState>,
) -> Result<Json<Envelope<ExpiredCleanupBody>>, AppError> {
    let store = video_store(&state)?;
    let removed = store.cleanup_expired(Utc::now()).await;
    Ok(Envelope::ok(ExpiredCleanupBody {
        message: format!("Cleaned up {removed} expired videos"),
        removed,
    }))
}

/// GET /api/videos/usage?sessionId=..
pub async fn handle_video_usage(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<VideoQuery>,
) -> Result<Json<Envelope<UsageBody>>, AppError> {
    let store = video_store(&state)?;
    let session_id = parse_uuid("sessionId", query.session_id.as_deref())?;
    let usage = store.session_usage(session_id).await;
    Ok(Envelope::ok(UsageBody { usage }))
}
