use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::{category_matches, Store, StorageError};
use crate::models::{PracticeSession, Question, Response};

/// File-per-record backend: every record is a pretty-printed JSON object in an
/// S3-compatible bucket.
///
/// Layout:
/// - `questions/{id}.json`
/// - `sessions/{id}.json`
/// - `responses/{id}.json`
/// - `session-responses/{session_id}/{created_millis}-{id}` (empty marker, lists a session's responses in order)
#[derive(Clone)]
pub struct ObjectStore {
    client: S3Client,
    bucket: String,
    prefix: String,
}

impl ObjectStore {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: "records/".to_string(),
        }
    }

    fn key(&self, path: &str) -> String {
        format!("{}{}", self.prefix, path)
    }

    async fn put_json<T: Serialize + Sync>(&self, path: &str, value: &T) -> Result<(), StorageError> {
        let body = serde_json::to_vec_pretty(value)?;
        self.put_bytes(path, body, "application/json").await
    }

    async fn put_bytes(
        &self,
        path: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let key = self.key(path);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Object(format!("put {key}: {}", DisplayErrorContext(&e))))?;
        debug!("Wrote s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, StorageError> {
        let key = self.key(path);
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                let service = e.into_service_error();
                if service.is_no_such_key() {
                    return Ok(None);
                }
                return Err(StorageError::Object(format!(
                    "get {key}: {}",
                    DisplayErrorContext(&service)
                )));
            }
        };
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Object(format!("read {key}: {e}")))?
            .into_bytes();
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Lists keys under `path`, relative to the store prefix, in key order.
    async fn list_keys(&self, path: &str) -> Result<Vec<String>, StorageError> {
        let prefix = self.key(path);
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| {
                    StorageError::Object(format!("list {prefix}: {}", DisplayErrorContext(&e)))
                })?;

            keys.extend(
                output
                    .contents()
                    .iter()
                    .filter_map(|o| o.key())
                    .filter_map(|k| k.strip_prefix(&self.prefix))
                    .map(str::to_string),
            );

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string())
                }
                _ => break,
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn get_all<T: DeserializeOwned>(&self, dir: &str) -> Result<Vec<T>, StorageError> {
        let mut records = Vec::new();
        for key in self.list_keys(dir).await? {
            if let Some(record) = self.get_json(&key).await? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

fn record_path(dir: &str, id: Uuid) -> String {
    format!("{dir}/{id}.json")
}

fn marker_path(session_id: Uuid, created_at: DateTime<Utc>, response_id: Uuid) -> String {
    format!(
        "session-responses/{session_id}/{:020}-{response_id}",
        created_at.timestamp_millis().max(0)
    )
}

fn response_id_from_marker(marker: &str) -> Option<Uuid> {
    let name = marker.rsplit('/').next()?;
    let (_, id) = name.split_once('-')?;
    Uuid::parse_str(id).ok()
}

#[async_trait]
impl Store for ObjectStore {
    fn backend(&self) -> &'static str {
        "s3"
    }

    async fn insert_question(&self, question: &Question) -> Result<(), StorageError> {
        self.put_json(&record_path("questions", question.id), question)
            .await
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>, StorageError> {
        self.get_json(&record_path("questions", id)).await
    }

    async fn list_questions(
        &self,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Question>, StorageError> {
        let mut questions: Vec<Question> = self
            .get_all::<Question>("questions/")
            .await?
            .into_iter()
            .filter(|q| category_matches(&q.category, category))
            .collect();
        questions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        questions.truncate(limit);
        Ok(questions)
    }

    async fn insert_session(&self, session: &PracticeSession) -> Result<(), StorageError> {
        self.put_json(&record_path("sessions", session.id), session)
            .await
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<PracticeSession>, StorageError> {
        self.get_json(&record_path("sessions", id)).await
    }

    async fn list_sessions(&self, limit: usize) -> Result<Vec<PracticeSession>, StorageError> {
        let mut sessions: Vec<PracticeSession> = self.get_all("sessions/").await?;
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions.truncate(limit);
        Ok(sessions)
    }

    async fn record_progress(
        &self,
        session_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<PracticeSession>, StorageError> {
        let Some(mut session) = self.get_session(session_id).await? else {
            return Ok(None);
        };
        session.record_answer(at);
        self.insert_session(&session).await?;
        Ok(Some(session))
    }

    async fn insert_response(&self, response: &Response) -> Result<(), StorageError> {
        self.put_json(&record_path("responses", response.id), response)
            .await?;
        self.put_bytes(
            &marker_path(response.session_id, response.created_at, response.id),
            Vec::new(),
            "text/plain",
        )
        .await
    }

    async fn get_response(&self, id: Uuid) -> Result<Option<Response>, StorageError> {
        self.get_json(&record_path("responses", id)).await
    }

    async fn list_responses(&self, session_id: Uuid) -> Result<Vec<Response>, StorageError> {
        let markers = self
            .list_keys(&format!("session-responses/{session_id}/"))
            .await?;
        let mut responses = Vec::with_capacity(markers.len());
        for id in markers.iter().filter_map(|m| response_id_from_marker(m)) {
            if let Some(response) = self.get_response(id).await? {
                responses.push(response);
            }
        }
        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_sorts_by_creation_time() {
        let session = Uuid::new_v4();
        let early = Utc::now();
        let late = early + chrono::Duration::seconds(30);
        let a = marker_path(session, late, Uuid::new_v4());
        let b = marker_path(session, early, Uuid::new_v4());
        let mut markers = vec![a.clone(), b.clone()];
        markers.sort();
        assert_eq!(markers, vec![b, a]);
    }

    #[test]
    fn test_response_id_round_trips_through_marker() {
        let id = Uuid::new_v4();
        let marker = marker_path(Uuid::new_v4(), Utc::now(), id);
        assert_eq!(response_id_from_marker(&marker), Some(id));
    }

    #[test]
    fn test_record_path() {
        let id = Uuid::nil();
        assert_eq!(
            record_path("sessions", id),
            "sessions/00000000-0000-0000-0000-000000000000.json"
        );
    }
}
