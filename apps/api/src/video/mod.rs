//! Answer videos: short recordings pushed to a blob store and indexed in-process.
//!
//! The index is not persisted: after a restart, previously uploaded blobs stay
//! reachable by URL but can no longer be looked up or expired through the API.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

pub mod handlers;

/// 10 MiB per video.
pub const MAX_VIDEO_BYTES: usize = 10 * 1024 * 1024;
pub const VIDEO_FORMAT: &str = "webm";
const VIDEO_TTL_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("Video too large ({size} bytes). Max size: {}MB", .max / (1024 * 1024))]
    TooLarge { size: usize, max: usize },

    #[error("video {0} not found")]
    NotFound(String),

    #[error("blob store error: {0}")]
    Blob(String),
}

/// Where video bytes live. Returns the public URL of the stored object.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<String, VideoError>;
    async fn delete(&self, key: &str) -> Result<(), VideoError>;
}

/// S3 / MinIO blob store. URLs are path-style: `{endpoint}/{bucket}/{key}`.
pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
    public_base: String,
}

impl S3BlobStore {
    pub fn new(client: S3Client, bucket: impl Into<String>, endpoint: &str) -> Self {
        let bucket = bucket.into();
        let public_base = format!("{}/{}", endpoint.trim_end_matches('/'), bucket);
        Self {
            client,
            bucket,
            public_base,
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<String, VideoError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| VideoError::Blob(format!("upload {key}: {}", DisplayErrorContext(&e))))?;
        Ok(format!("{}/{}", self.public_base, key))
    }

    async fn delete(&self, key: &str) -> Result<(), VideoError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| VideoError::Blob(format!("delete {key}: {}", DisplayErrorContext(&e))))?;
        Ok(())
    }
}

/// Metadata for one uploaded answer video.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionVideo {
    pub id: String,
    pub session_id: Uuid,
    pub question_id: Uuid,
    pub url: String,
    pub size: usize,
    /// Seconds. Not extracted from the container yet, always 0.
    pub duration: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip)]
    key: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUsage {
    pub total_size: usize,
    pub video_count: usize,
}

#[derive(Clone)]
pub struct VideoStore {
    blobs: Arc<dyn BlobStore>,
    index: Arc<RwLock<HashMap<String, SessionVideo>>>,
}

impl VideoStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            blobs,
            index: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn store_session_video(
        &self,
        session_id: Uuid,
        question_id: Uuid,
        body: Bytes,
        content_type: &str,
    ) -> Result<SessionVideo, VideoError> {
        if body.len() > MAX_VIDEO_BYTES {
            return Err(VideoError::TooLarge {
                size: body.len(),
                max: MAX_VIDEO_BYTES,
            });
        }

        let now = Utc::now();
        let id = format!("{session_id}-{question_id}-{}", now.timestamp_millis());
        let key = format!("videos/{id}.{VIDEO_FORMAT}");
        let size = body.len();
        let url = self.blobs.put(&key, body, content_type).await?;

        let video = SessionVideo {
            id: id.clone(),
            session_id,
            question_id,
            url,
            size,
            duration: 0,
            created_at: now,
            expires_at: now + Duration::hours(VIDEO_TTL_HOURS),
            key,
        };
        self.index.write().await.insert(id, video.clone());
        info!("Stored video {} ({} bytes)", video.id, video.size);
        Ok(video)
    }

    /// Most recent upload for the session/question pair.
    pub async fn get_session_video(
        &self,
        session_id: Uuid,
        question_id: Uuid,
    ) -> Option<SessionVideo> {
        self.index
            .read()
            .await
            .values()
            .filter(|v| v.session_id == session_id && v.question_id == question_id)
            .max_by_key(|v| v.created_at)
            .cloned()
    }

    pub async fn delete_video(&self, id: &str) -> Result<(), VideoError> {
        let key = self
            .index
            .read()
            .await
            .get(id)
            .map(|v| v.key.clone())
            .ok_or_else(|| VideoError::NotFound(id.to_string()))?;
        self.blobs.delete(&key).await?;
        self.index.write().await.remove(id);
        Ok(())
    }

    /// Deletes every video whose expiry is before `now`. Returns how many were removed;
    /// blobs that fail to delete stay indexed for the next pass.
    pub async fn cleanup_expired(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .index
            .read()
            .await
            .values()
            .filter(|v| v.expires_at < now)
            .map(|v| v.id.clone())
            .collect();

        let mut removed = 0;
        for id in expired {
            match self.delete_video(&id).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to delete expired video {id}: {e}"),
            }
        }
        removed
    }

    pub async fn session_usage(&self, session_id: Uuid) -> SessionUsage {
        let index = self.index.read().await;
        let videos = index.values().filter(|v| v.session_id == session_id);
        let (total_size, video_count) = videos.fold((0, 0), |(size, count), v| (size + v.size, count + 1));
        SessionUsage {
            total_size,
            video_count,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MemoryBlobStore;
    use super::*;

    fn store() -> (Arc<MemoryBlobStore>, VideoStore) {
        let blobs = Arc::new(MemoryBlobStore::default());
        (blobs.clone(), VideoStore::new(blobs))
    }

    #[tokio::test]
    async fn test_store_and_lookup() {
        let (blobs, videos) = store();
        let (s, q) = (Uuid::new_v4(), Uuid::new_v4());
        let video = videos
            .store_session_video(s, q, Bytes::from_static(b"webm-bytes"), "video/webm")
            .await
            .unwrap();

        assert!(video.url.starts_with("memory://videos/"));
        assert!(video.url.ends_with(".webm"));
        assert_eq!(video.size, 10);
        assert_eq!(video.expires_at - video.created_at, Duration::hours(24));
        assert_eq!(blobs.objects.lock().unwrap().len(), 1);

        let found = videos.get_session_video(s, q).await.unwrap();
        assert_eq!(found.id, video.id);
        assert!(videos.get_session_video(s, Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_oversized_video_rejected() {
        let (blobs, videos) = store();
        let body = Bytes::from(vec![0u8; MAX_VIDEO_BYTES + 1]);
        let err = videos
            .store_session_video(Uuid::new_v4(), Uuid::new_v4(), body, "video/webm")
            .await
            .unwrap_err();
        assert!(matches!(err, VideoError::TooLarge { .. }));
        assert!(err.to_string().contains("Max size: 10MB"));
        assert!(blobs.objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_video_is_not_found() {
        let (_, videos) = store();
        let err = videos.delete_video("nope").await.unwrap_err();
        assert!(matches!(err, VideoError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired() {
        let (blobs, videos) = store();
        let s = Uuid::new_v4();
        videos
            .store_session_video(s, Uuid::new_v4(), Bytes::from_static(b"a"), "video/webm")
            .await
            .unwrap();

        assert_eq!(videos.cleanup_expired(Utc::now()).await, 0);
        let later = Utc::now() + Duration::hours(25);
        assert_eq!(videos.cleanup_expired(later).await, 1);
        assert!(blobs.objects.lock().unwrap().is_empty());
        assert_eq!(videos.session_usage(s).await.video_count, 0);
    }

    #[tokio::test]
    async fn test_failed_blob_delete_keeps_index_entry() {
        let (blobs, videos) = store();
        let video = videos
            .store_session_video(Uuid::new_v4(), Uuid::new_v4(), Bytes::from_static(b"a"), "video/webm")
            .await
            .unwrap();
        blobs.failing.lock().unwrap().push(video.key.clone());

        let later = Utc::now() + Duration::hours(25);
        assert_eq!(videos.cleanup_expired(later).await, 0);
        assert!(videos.delete_video(&video.id).await.is_err());
        assert_eq!(videos.session_usage(video.session_id).await.video_count, 1);
    }

    #[tokio::test]
    async fn test_session_usage_sums_sizes() {
        let (_, videos) = store();
        let s = Uuid::new_v4();
        for body in [&b"abc"[..], &b"defgh"[..]] {
            videos
                .store_session_video(s, Uuid::new_v4(), Bytes::copy_from_slice(body), "video/webm")
                .await
                .unwrap();
        }
        let usage = videos.session_usage(s).await;
        assert_eq!(
            usage,
            SessionUsage {
                total_size: 8,
                video_count: 2
            }
        );
    }
}
