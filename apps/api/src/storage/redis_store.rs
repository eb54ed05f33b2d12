use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::{category_matches, Store, StorageError};
use crate::models::{PracticeSession, Question, Response};

const QUESTIONS_KEY: &str = "interview:questions";
const SESSIONS_KEY: &str = "interview:sessions";
const RESPONSES_KEY: &str = "interview:responses";

fn session_responses_key(session_id: Uuid) -> String {
    format!("interview:session:{session_id}:responses")
}

/// Key-value backend: one Redis hash per entity type (field = id, value = JSON)
/// plus a list of response ids per session.
///
/// Progress updates are read-modify-write and not atomic across writers.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    pub async fn connect(client: &redis::Client) -> Result<Self, StorageError> {
        let conn = client.get_multiplexed_async_connection().await?;
        info!("Redis connection established");
        Ok(Self { conn })
    }

    async fn put<T: Serialize + Sync>(
        &self,
        hash: &str,
        id: Uuid,
        value: &T,
    ) -> Result<(), StorageError> {
        let json = serde_json::to_string(value)?;
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(hash, id.to_string(), json).await?;
        Ok(())
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        hash: &str,
        id: Uuid,
    ) -> Result<Option<T>, StorageError> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn.hget(hash, id.to_string()).await?;
        json.map(|j| serde_json::from_str(&j))
            .transpose()
            .map_err(StorageError::from)
    }

    async fn fetch_all<T: DeserializeOwned>(&self, hash: &str) -> Result<Vec<T>, StorageError> {
        let mut conn = self.conn.clone();
        let values: Vec<String> = conn.hvals(hash).await?;
        values
            .iter()
            .map(|v| serde_json::from_str(v).map_err(StorageError::from))
            .collect()
    }
}

#[async_trait]
impl Store for RedisStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn insert_question(&self, question: &Question) -> Result<(), StorageError> {
        self.put(QUESTIONS_KEY, question.id, question).await
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>, StorageError> {
        self.fetch(QUESTIONS_KEY, id).await
    }

    async fn list_questions(
        &self,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Question>, StorageError> {
        let mut questions: Vec<Question> = self
            .fetch_all::<Question>(QUESTIONS_KEY)
            .await?
            .into_iter()
            .filter(|q| category_matches(&q.category, category))
            .collect();
        questions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        questions.truncate(limit);
        Ok(questions)
    }

    async fn insert_session(&self, session: &PracticeSession) -> Result<(), StorageError> {
        self.put(SESSIONS_KEY, session.id, session).await
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<PracticeSession>, StorageError> {
        self.fetch(SESSIONS_KEY, id).await
    }

    async fn list_sessions(&self, limit: usize) -> Result<Vec<PracticeSession>, StorageError> {
        let mut sessions: Vec<PracticeSession> = self.fetch_all(SESSIONS_KEY).await?;
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
        self.put(SESSIONS_KEY, session.id, &session).await?;
        Ok(Some(session))
    }

    async fn insert_response(&self, response: &Response) -> Result<(), StorageError> {
        self.put(RESPONSES_KEY, response.id, response).await?;
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(
            session_responses_key(response.session_id),
            response.id.to_string(),
        )
        .await?;
        Ok(())
    }

    async fn get_response(&self, id: Uuid) -> Result<Option<Response>, StorageError> {
        self.fetch(RESPONSES_KEY, id).await
    }

    async fn list_responses(&self, session_id: Uuid) -> Result<Vec<Response>, StorageError> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn
            .lrange(session_responses_key(session_id), 0, -1)
            .await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let values: Vec<Option<String>> = conn.hget(RESPONSES_KEY, &ids).await?;
        values
            .into_iter()
            .flatten()
            .map(|v| serde_json::from_str(&v).map_err(StorageError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_responses_key_format() {
        let id = Uuid::nil();
        assert_eq!(
            session_responses_key(id),
            "interview:session:00000000-0000-0000-0000-000000000000:responses"
        );
    }
}
