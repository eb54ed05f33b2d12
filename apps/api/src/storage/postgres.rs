use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{Store, StorageError};
use crate::models::{Evaluation, PracticeSession, Question, QuestionType, Response};

/// Relational backend. Foreign keys and the CHECK on `type` are enforced by
/// PostgreSQL in addition to the repository checks.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct QuestionRow {
    id: Uuid,
    question: String,
    #[sqlx(rename = "type")]
    kind: String,
    category: String,
    created_at: DateTime<Utc>,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        Question {
            id: row.id,
            question: row.question,
            question_type: QuestionType::normalize(&row.kind),
            category: row.category,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct SessionRow {
    id: Uuid,
    title: String,
    subject: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    total_questions: i32,
    completed_questions: i32,
    resume: Option<String>,
    job_description: Option<String>,
    candidate_analysis: Option<String>,
    question_ids: Vec<Uuid>,
}

impl From<SessionRow> for PracticeSession {
    fn from(row: SessionRow) -> Self {
        PracticeSession {
            id: row.id,
            title: row.title,
            subject: row.subject,
            created_at: row.created_at,
            completed_at: row.completed_at,
            total_questions: u32::try_from(row.total_questions).unwrap_or(0),
            completed_questions: u32::try_from(row.completed_questions).unwrap_or(0),
            resume: row.resume,
            job_description: row.job_description,
            candidate_analysis: row.candidate_analysis,
            question_ids: row.question_ids,
        }
    }
}

#[derive(Debug, FromRow)]
struct ResponseRow {
    id: Uuid,
    session_id: Uuid,
    question_id: Uuid,
    question_text: String,
    audio_url: Option<String>,
    video_url: Option<String>,
    text_response: Option<String>,
    transcription: Option<String>,
    evaluation: Json<Evaluation>,
    created_at: DateTime<Utc>,
}

impl From<ResponseRow> for Response {
    fn from(row: ResponseRow) -> Self {
        Response {
            id: row.id,
            session_id: row.session_id,
            question_id: row.question_id,
            question_text: row.question_text,
            audio_url: row.audio_url,
            video_url: row.video_url,
            text_response: row.text_response,
            transcription: row.transcription,
            evaluation: row.evaluation.0,
            created_at: row.created_at,
        }
    }
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn to_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Substring pattern for `LIKE ... ESCAPE '\'`; wildcards in the filter match literally.
fn like_pattern(filter: &str) -> String {
    let mut pattern = String::with_capacity(filter.len() + 2);
    pattern.push('%');
    for c in filter.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn insert_question(&self, question: &Question) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO questions (id, question, type, category, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(question.id)
        .bind(&question.question)
        .bind(question.question_type.as_str())
        .bind(&question.category)
        .bind(question.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>, StorageError> {
        let row = sqlx::query_as::<_, QuestionRow>("SELECT * FROM questions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Question::from))
    }

    async fn list_questions(
        &self,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Question>, StorageError> {
        let pattern = category.map(like_pattern);
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT * FROM questions
            WHERE ($1::text IS NULL OR LOWER(category) LIKE LOWER($1) ESCAPE '\')
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(pattern)
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Question::from).collect())
    }

    async fn insert_session(&self, session: &PracticeSession) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO practice_sessions
                (id, title, subject, created_at, completed_at, total_questions,
                 completed_questions, resume, job_description, candidate_analysis, question_ids)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(session.id)
        .bind(&session.title)
        .bind(&session.subject)
        .bind(session.created_at)
        .bind(session.completed_at)
        .bind(to_i32(session.total_questions))
        .bind(to_i32(session.completed_questions))
        .bind(&session.resume)
        .bind(&session.job_description)
        .bind(&session.candidate_analysis)
        .bind(&session.question_ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<PracticeSession>, StorageError> {
        let row = sqlx::query_as::<_, SessionRow>("SELECT * FROM practice_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PracticeSession::from))
    }

    async fn list_sessions(&self, limit: usize) -> Result<Vec<PracticeSession>, StorageError> {
        let rows = sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM practice_sessions ORDER BY created_at DESC LIMIT $1",
        )
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PracticeSession::from).collect())
    }

    async fn record_progress(
        &self,
        session_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<PracticeSession>, StorageError> {
        // Single statement so concurrent answers cannot lose an increment.
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE practice_sessions
            SET completed_questions = completed_questions + 1,
                completed_at = CASE
                    WHEN completed_at IS NULL
                         AND total_questions > 0
                         AND completed_questions + 1 >= total_questions
                    THEN $2
                    ELSE completed_at
                END
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(PracticeSession::from))
    }

    async fn insert_response(&self, response: &Response) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO responses
                (id, session_id, question_id, question_text, audio_url, video_url,
                 text_response, transcription, evaluation, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(response.id)
        .bind(response.session_id)
        .bind(response.question_id)
        .bind(&response.question_text)
        .bind(&response.audio_url)
        .bind(&response.video_url)
        .bind(&response.text_response)
        .bind(&response.transcription)
        .bind(Json(&response.evaluation))
        .bind(response.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_response(&self, id: Uuid) -> Result<Option<Response>, StorageError> {
        let row = sqlx::query_as::<_, ResponseRow>("SELECT * FROM responses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Response::from))
    }

    async fn list_responses(&self, session_id: Uuid) -> Result<Vec<Response>, StorageError> {
        let rows = sqlx::query_as::<_, ResponseRow>(
            "SELECT * FROM responses WHERE session_id = $1 ORDER BY created_at",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Response::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_row_normalizes_legacy_type() {
        let row = QuestionRow {
            id: Uuid::new_v4(),
            question: "Design a cache".into(),
            kind: "Technical".into(),
            category: "Systems".into(),
            created_at: Utc::now(),
        };
        let question = Question::from(row);
        assert_eq!(question.question_type, QuestionType::Technical);
    }

    #[test]
    fn test_session_row_clamps_negative_counts() {
        let row = SessionRow {
            id: Uuid::new_v4(),
            title: "t".into(),
            subject: "s".into(),
            created_at: Utc::now(),
            completed_at: None,
            total_questions: -1,
            completed_questions: 2,
            resume: None,
            job_description: None,
            candidate_analysis: None,
            question_ids: vec![],
        };
        let session = PracticeSession::from(row);
        assert_eq!(session.total_questions, 0);
        assert_eq!(session.completed_questions, 2);
    }

    #[test]
    fn test_limit_conversion_saturates() {
        assert_eq!(to_limit(10), 10);
        assert_eq!(to_i32(u32::MAX), i32::MAX);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rust"), "%rust%");
        assert_eq!(like_pattern("50%_off\\"), r"%50\%\_off\\%");
    }
}
