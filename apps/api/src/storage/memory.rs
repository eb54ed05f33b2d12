use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{category_matches, Store, StorageError};
use crate::models::{PracticeSession, Question, Response};

/// In-process store. Data lives as long as the server process; used for local
/// runs without infrastructure and throughout the test suite.
#[derive(Default)]
pub struct MemoryStore {
    questions: RwLock<HashMap<Uuid, Question>>,
    sessions: RwLock<HashMap<Uuid, PracticeSession>>,
    responses: RwLock<HashMap<Uuid, Response>>,
    /// Response ids per session in insertion order.
    session_responses: RwLock<HashMap<Uuid, Vec<Uuid>>>,
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert_question(&self, question: &Question) -> Result<(), StorageError> {
        self.questions
            .write()
            .await
            .insert(question.id, question.clone());
        Ok(())
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>, StorageError> {
        Ok(self.questions.read().await.get(&id).cloned())
    }

    async fn list_questions(
        &self,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Question>, StorageError> {
        let mut questions: Vec<Question> = self
            .questions
            .read()
            .await
            .values()
            .filter(|q| category_matches(&q.category, category))
            .cloned()
            .collect();
        questions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        questions.truncate(limit);
        Ok(questions)
    }

    async fn insert_session(&self, session: &PracticeSession) -> Result<(), StorageError> {
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<PracticeSession>, StorageError> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn list_sessions(&self, limit: usize) -> Result<Vec<PracticeSession>, StorageError> {
        let mut sessions: Vec<PracticeSession> =
            self.sessions.read().await.values().cloned().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions.truncate(limit);
        Ok(sessions)
    }

    async fn record_progress(
        &self,
        session_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<PracticeSession>, StorageError> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.get_mut(&session_id).map(|session| {
            session.record_answer(at);
            session.clone()
        }))
    }

    async fn insert_response(&self, response: &Response) -> Result<(), StorageError> {
        self.responses
            .write()
            .await
            .insert(response.id, response.clone());
        self.session_responses
            .write()
            .await
            .entry(response.session_id)
            .or_default()
            .push(response.id);
        Ok(())
    }

    async fn get_response(&self, id: Uuid) -> Result<Option<Response>, StorageError> {
        Ok(self.responses.read().await.get(&id).cloned())
    }

    async fn list_responses(&self, session_id: Uuid) -> Result<Vec<Response>, StorageError> {
        let ids = self
            .session_responses
            .read()
            .await
            .get(&session_id)
            .cloned()
            .unwrap_or_default();
        let responses = self.responses.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| responses.get(id).cloned())
            .collect())
    }
}
