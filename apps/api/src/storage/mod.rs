//! Persistence: one `Store` trait, four interchangeable backends.
//!
//! Backends only move records in and out. Identifier assignment, input
//! normalization and referential integrity (response → session + question,
//! session → listed questions) live in `Repository` so every backend gets the
//! same guarantees.
//!
//! There is no cross-entity transaction: a response insert and the session
//! progress update are two independent writes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Evaluation, PracticeSession, Question, QuestionType, Response};

pub mod memory;
pub mod object_store;
pub mod postgres;
pub mod redis_store;

pub use memory::MemoryStore;
pub use object_store::ObjectStore;
pub use postgres::PgStore;
pub use redis_store::RedisStore;

const MAX_TITLE_CHARS: usize = 255;
const MAX_SUBJECT_CHARS: usize = 100;
const MAX_CATEGORY_CHARS: usize = 100;
const DEFAULT_CATEGORY: &str = "General";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("object store error: {0}")]
    Object(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Raw record access. Implementations must be safe to share across requests.
#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend name for logs and the health endpoint.
    fn backend(&self) -> &'static str;

    async fn insert_question(&self, question: &Question) -> Result<(), StorageError>;
    async fn get_question(&self, id: Uuid) -> Result<Option<Question>, StorageError>;
    /// Newest first. `category` is a case-insensitive substring filter.
    async fn list_questions(
        &self,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Question>, StorageError>;

    async fn insert_session(&self, session: &PracticeSession) -> Result<(), StorageError>;
    async fn get_session(&self, id: Uuid) -> Result<Option<PracticeSession>, StorageError>;
    /// Newest first.
    async fn list_sessions(&self, limit: usize) -> Result<Vec<PracticeSession>, StorageError>;
    /// Applies `PracticeSession::record_answer` and returns the updated session.
    async fn record_progress(
        &self,
        session_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<PracticeSession>, StorageError>;

    async fn insert_response(&self, response: &Response) -> Result<(), StorageError>;
    async fn get_response(&self, id: Uuid) -> Result<Option<Response>, StorageError>;
    /// Oldest first.
    async fn list_responses(&self, session_id: Uuid) -> Result<Vec<Response>, StorageError>;
}

/// Input for `Repository::create_question`.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub question: String,
    pub question_type: QuestionType,
    pub category: String,
}

/// Input for `Repository::create_session`.
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub title: String,
    pub subject: String,
    pub total_questions: u32,
    pub resume: Option<String>,
    pub job_description: Option<String>,
    pub candidate_analysis: Option<String>,
    pub question_ids: Vec<Uuid>,
}

/// Input for `Repository::create_response`.
#[derive(Debug, Clone)]
pub struct NewResponse {
    pub session_id: Uuid,
    pub question_id: Uuid,
    pub question_text: String,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub text_response: Option<String>,
    pub transcription: Option<String>,
    pub evaluation: Evaluation,
}

/// The storage interface used by handlers.
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn Store>,
}

impl Repository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    pub async fn create_question(&self, new: NewQuestion) -> Result<Question, AppError> {
        let text = new.question.trim();
        if text.is_empty() {
            return Err(AppError::Validation("Question text cannot be empty".to_string()));
        }
        let category = match new.category.trim() {
            "" => DEFAULT_CATEGORY.to_string(),
            c => truncate_chars(c, MAX_CATEGORY_CHARS),
        };

        let question = Question {
            id: Uuid::new_v4(),
            question: text.to_string(),
            question_type: new.question_type,
            category,
            created_at: Utc::now(),
        };
        self.store.insert_question(&question).await?;
        Ok(question)
    }

    pub async fn question(&self, id: Uuid) -> Result<Question, AppError> {
        self.store
            .get_question(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Question {id} not found")))
    }

    pub async fn questions(
        &self,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Question>, AppError> {
        let category = category.map(str::trim).filter(|c| !c.is_empty());
        Ok(self.store.list_questions(category, limit).await?)
    }

    pub async fn create_session(&self, new: NewSession) -> Result<PracticeSession, AppError> {
        let title = required_field("title", &new.title, MAX_TITLE_CHARS)?;
        let subject = required_field("subject", &new.subject, MAX_SUBJECT_CHARS)?;

        for id in &new.question_ids {
            if self.store.get_question(*id).await?.is_none() {
                return Err(AppError::Validation(format!(
                    "Question {id} referenced by the session does not exist"
                )));
            }
        }

        let total_questions = if new.total_questions == 0 {
            u32::try_from(new.question_ids.len()).unwrap_or(u32::MAX)
        } else {
            new.total_questions
        };

        let session = PracticeSession {
            id: Uuid::new_v4(),
            title,
            subject,
            created_at: Utc::now(),
            completed_at: None,
            total_questions,
            completed_questions: 0,
            resume: non_blank(new.resume),
            job_description: non_blank(new.job_description),
            candidate_analysis: non_blank(new.candidate_analysis),
            question_ids: new.question_ids,
        };
        self.store.insert_session(&session).await?;
        info!(
            "Created practice session {} ({} questions) on {}",
            session.id,
            session.total_questions,
            self.backend()
        );
        Ok(session)
    }

    pub async fn session(&self, id: Uuid) -> Result<PracticeSession, AppError> {
        self.store
            .get_session(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
    }

    pub async fn sessions(&self, limit: usize) -> Result<Vec<PracticeSession>, AppError> {
        Ok(self.store.list_sessions(limit).await?)
    }

    /// Stores a response after checking both references, then advances the
    /// session's progress counters.
    pub async fn create_response(
        &self,
        new: NewResponse,
    ) -> Result<(Response, PracticeSession), AppError> {
        self.session(new.session_id).await?;
        self.question(new.question_id).await?;

        let response = Response {
            id: Uuid::new_v4(),
            session_id: new.session_id,
            question_id: new.question_id,
            question_text: new.question_text.trim().to_string(),
            audio_url: non_blank(new.audio_url),
            video_url: non_blank(new.video_url),
            text_response: non_blank(new.text_response),
            transcription: non_blank(new.transcription),
            evaluation: new.evaluation,
            created_at: Utc::now(),
        };
        self.store.insert_response(&response).await?;

        let session = match self
            .store
            .record_progress(response.session_id, response.created_at)
            .await?
        {
            Some(session) => session,
            None => {
                warn!(
                    "Session {} disappeared while recording response {}",
                    response.session_id, response.id
                );
                return Err(AppError::NotFound(format!(
                    "Session {} not found",
                    response.session_id
                )));
            }
        };
        Ok((response, session))
    }

    pub async fn response(&self, id: Uuid) -> Result<Response, AppError> {
        self.store
            .get_response(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Response {id} not found")))
    }

    pub async fn responses(&self, session_id: Uuid) -> Result<Vec<Response>, AppError> {
        self.session(session_id).await?;
        Ok(self.store.list_responses(session_id).await?)
    }
}

fn required_field(name: &str, value: &str, max_chars: usize) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{name} is required")));
    }
    if value.chars().count() > max_chars {
        return Err(AppError::Validation(format!(
            "{name} must be at most {max_chars} characters"
        )));
    }
    Ok(value.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

/// Case-insensitive substring match shared by the non-SQL backends.
pub(crate) fn category_matches(category: &str, filter: Option<&str>) -> bool {
    match filter {
        Some(f) => category.to_lowercase().contains(&f.to_lowercase()),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubScores;

    fn repo() -> Repository {
        Repository::new(Arc::new(MemoryStore::default()))
    }

    fn evaluation() -> Evaluation {
        Evaluation {
            score: 88,
            feedback: "Clear and structured.".into(),
            strengths: vec!["structure".into()],
            improvements: vec!["metrics".into()],
            timeline_analysis: SubScores {
                clarity: 9,
                confidence: 8,
                technical_depth: 7,
                communication: 9,
                structure: 10,
                engagement: 6,
                completeness: 5,
            },
            fallback: false,
        }
    }

    async fn question(repo: &Repository) -> Question {
        repo.create_question(NewQuestion {
            question: "Tell me about a conflict.".into(),
            question_type: QuestionType::Behavioral,
            category: "Leadership".into(),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let repo = repo();
        let created = repo
            .create_session(NewSession {
                title: "  Backend loop ".into(),
                subject: "Rust".into(),
                total_questions: 3,
                ..Default::default()
            })
            .await
            .unwrap();
        let fetched = repo.session(created.id).await.unwrap();
        assert_eq!(fetched.title, "Backend loop");
        assert_eq!(fetched.subject, "Rust");
        assert_eq!(fetched.total_questions, 3);
        assert_eq!(fetched.completed_questions, 0);
    }

    #[tokio::test]
    async fn test_blank_title_is_validation_error() {
        let err = repo()
            .create_session(NewSession {
                title: "   ".into(),
                subject: "Rust".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_overlong_subject_is_validation_error() {
        let err = repo()
            .create_session(NewSession {
                title: "t".into(),
                subject: "x".repeat(101),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_session_with_unknown_question_is_rejected() {
        let err = repo()
            .create_session(NewSession {
                title: "t".into(),
                subject: "s".into(),
                question_ids: vec![Uuid::new_v4()],
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_total_defaults_to_question_ids_len() {
        let repo = repo();
        let q1 = question(&repo).await;
        let q2 = question(&repo).await;
        let session = repo
            .create_session(NewSession {
                title: "t".into(),
                subject: "s".into(),
                question_ids: vec![q1.id, q2.id],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(session.total_questions, 2);
        assert_eq!(session.question_ids, vec![q1.id, q2.id]);
    }

    #[tokio::test]
    async fn test_blank_category_becomes_general() {
        let q = repo()
            .create_question(NewQuestion {
                question: "Why Rust?".into(),
                question_type: QuestionType::Technical,
                category: " ".into(),
            })
            .await
            .unwrap();
        assert_eq!(q.category, "General");
    }

    #[tokio::test]
    async fn test_response_round_trips_sub_scores_and_advances_progress() {
        let repo = repo();
        let q = question(&repo).await;
        let session = repo
            .create_session(NewSession {
                title: "t".into(),
                subject: "s".into(),
                total_questions: 1,
                ..Default::default()
            })
            .await
            .unwrap();

        let (response, updated) = repo
            .create_response(NewResponse {
                session_id: session.id,
                question_id: q.id,
                question_text: q.question.clone(),
                audio_url: None,
                video_url: Some("".into()),
                text_response: Some("We resolved it by...".into()),
                transcription: None,
                evaluation: evaluation(),
            })
            .await
            .unwrap();

        assert!(response.video_url.is_none());
        assert_eq!(updated.completed_questions, 1);
        assert!(updated.completed_at.is_some());

        let stored = repo.responses(session.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].evaluation.timeline_analysis, evaluation().timeline_analysis);
        assert_eq!(repo.response(response.id).await.unwrap(), response);
    }

    #[tokio::test]
    async fn test_response_requires_existing_session_and_question() {
        let repo = repo();
        let q = question(&repo).await;
        let missing_session = repo
            .create_response(NewResponse {
                session_id: Uuid::new_v4(),
                question_id: q.id,
                question_text: "x".into(),
                audio_url: None,
                video_url: None,
                text_response: Some("a".into()),
                transcription: None,
                evaluation: evaluation(),
            })
            .await
            .unwrap_err();
        assert!(matches!(missing_session, AppError::NotFound(_)));

        let session = repo
            .create_session(NewSession {
                title: "t".into(),
                subject: "s".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let missing_question = repo
            .create_response(NewResponse {
                session_id: session.id,
                question_id: Uuid::new_v4(),
                question_text: "x".into(),
                audio_url: None,
                video_url: None,
                text_response: Some("a".into()),
                transcription: None,
                evaluation: evaluation(),
            })
            .await
            .unwrap_err();
        assert!(matches!(missing_question, AppError::NotFound(_)));
        assert!(repo.responses(session.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_session_creation_yields_distinct_ids() {
        let repo = repo();
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    repo.create_session(NewSession {
                        title: format!("run {i}"),
                        subject: "Rust".into(),
                        ..Default::default()
                    })
                    .await
                    .unwrap()
                    .id
                })
            })
            .collect();

        let mut ids = std::collections::HashSet::new();
        for handle in handles {
            assert!(ids.insert(handle.await.unwrap()));
        }
        assert_eq!(ids.len(), 32);
        assert_eq!(repo.sessions(100).await.unwrap().len(), 32);
    }

    #[test]
    fn test_category_matches_is_case_insensitive_substring() {
        assert!(category_matches("Distributed Systems", Some("systems")));
        assert!(!category_matches("Frontend", Some("systems")));
        assert!(category_matches("anything", None));
    }
}
