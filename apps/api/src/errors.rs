use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::llm_client::recovery::RecoveryError;
use crate::llm_client::LlmError;
use crate::storage::StorageError;
use crate::video::VideoError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Model returned malformed output: {reason}")]
    MalformedOutput { reason: String, excerpt: String },

    #[error("AI service not configured")]
    LlmUnavailable,

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::NotConfigured => AppError::LlmUnavailable,
            LlmError::Malformed(RecoveryError::Malformed { reason, excerpt }) => {
                AppError::MalformedOutput { reason, excerpt }
            }
            other => AppError::Llm(other.to_string()),
        }
    }
}

impl From<VideoError> for AppError {
    fn from(err: VideoError) -> Self {
        match err {
            VideoError::TooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            VideoError::NotFound(id) => AppError::NotFound(format!("Video {id} not found")),
            VideoError::Blob(msg) => AppError::Storage(StorageError::Object(msg)),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(format!("Invalid query string: {}", rejection.body_text()))
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::Validation(format!("Invalid multipart body: {}", rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, details): (StatusCode, String, Option<Value>) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone(), None),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone(), None),
            AppError::MalformedOutput { reason, excerpt } => {
                tracing::warn!("Malformed model output: {reason}");
                (
                    StatusCode::BAD_GATEWAY,
                    "The AI service returned output that could not be parsed".to_string(),
                    Some(json!({ "reason": reason, "excerpt": excerpt })),
                )
            }
            AppError::LlmUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "AI service not configured".to_string(),
                None,
            ),
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An AI processing error occurred".to_string(),
                    Some(json!(msg)),
                )
            }
            AppError::Storage(e) => {
                tracing::error!("Storage error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A storage error occurred".to_string(),
                    None,
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                    None,
                )
            }
        };

        let body = match details {
            Some(details) => json!({ "error": message, "details": details }),
            None => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (AppError::PayloadTooLarge("x".into()), StatusCode::PAYLOAD_TOO_LARGE),
            (AppError::LlmUnavailable, StatusCode::SERVICE_UNAVAILABLE),
            (AppError::Llm("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_llm_not_configured_maps_to_unavailable() {
        let err: AppError = LlmError::NotConfigured.into();
        assert!(matches!(err, AppError::LlmUnavailable));
    }

    #[test]
    fn test_recovery_failure_maps_to_malformed_output() {
        let err: AppError = LlmError::Malformed(RecoveryError::Malformed {
            reason: "expected value".into(),
            excerpt: "Sure! Here".into(),
        })
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_video_too_large_maps_to_413() {
        let err: AppError = VideoError::TooLarge {
            size: 11 * 1024 * 1024,
            max: 10 * 1024 * 1024,
        }
        .into();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));
    }
}
