//! Axum route handlers for questions, practice sessions, answer evaluation and
//! clarification coaching.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::clarification::clarify;
use crate::interview::evaluator::{evaluate_answer, fallback_evaluation, EvaluationInput};
use crate::interview::generator::{
    fallback_questions, generate_questions, GenerationRequest, DEFAULT_QUESTION_COUNT,
    MAX_QUESTION_COUNT,
};
use crate::interview::prompts::CandidateContext;
use crate::llm_client::LlmError;
use crate::models::{Evaluation, PracticeSession, Question, QuestionType, Response};
use crate::routes::extract::{AppJson, AppQuery};
use crate::routes::Envelope;
use crate::state::AppState;
use crate::storage::{NewQuestion, NewResponse, NewSession};

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 200;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerateQuestionsRequest {
    pub subject: String,
    pub count: Option<u32>,
    #[serde(rename = "type")]
    pub question_type: Option<String>,
    pub resume: Option<String>,
    pub job_description: Option<String>,
    pub candidate_analysis: Option<String>,
    pub allow_fallback: bool,
}

#[derive(Debug, Serialize)]
pub struct GeneratedQuestions {
    pub questions: Vec<Question>,
    pub fallback: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuestionsQuery {
    pub category: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct QuestionList {
    pub questions: Vec<Question>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub title: String,
    pub subject: String,
    pub total_questions: Option<u32>,
    pub resume: Option<String>,
    pub job_description: Option<String>,
    pub candidate_analysis: Option<String>,
    pub question_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionBody {
    pub session: PracticeSession,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListSessionsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SessionList {
    pub sessions: Vec<PracticeSession>,
}

#[derive(Debug, Serialize)]
pub struct SessionResults {
    #[serde(flatten)]
    pub session: PracticeSession,
    pub responses: Vec<Response>,
    pub is_complete: bool,
    /// Mean overall score across stored responses; absent when there are none.
    pub average_score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SessionResultsBody {
    pub session: SessionResults,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub session_id: Option<String>,
    pub question_id: Option<String>,
    pub question_text: String,
    pub question_type: Option<String>,
    pub text_response: Option<String>,
    pub transcription: Option<String>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub allow_fallback: bool,
}

#[derive(Debug, Serialize)]
pub struct EvaluateBody {
    pub response: Response,
    pub evaluation: Evaluation,
    pub fallback: bool,
    pub session: PracticeSession,
}

#[derive(Debug, Serialize)]
pub struct ResponseBody {
    pub response: Response,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClarificationRequest {
    pub clarifying_question: String,
    pub interview_question: String,
}

#[derive(Debug, Serialize)]
pub struct ClarificationBody {
    pub guidance: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn parse_id(name: &str, value: Option<&str>) -> Result<Uuid, AppError> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{name} is required")))?;
    Uuid::parse_str(value)
        .map_err(|_| AppError::Validation(format!("{name} '{value}' is not a valid id")))
}

fn parse_question_type(value: Option<&str>) -> Result<Option<QuestionType>, AppError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => QuestionType::parse(&v.to_lowercase()).map(Some).ok_or_else(|| {
            let valid: Vec<&str> = QuestionType::ALL.iter().map(|t| t.as_str()).collect();
            AppError::Validation(format!(
                "Unknown question type '{v}'. Expected one of: {}",
                valid.join(", ")
            ))
        }),
    }
}

fn list_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

fn context_of(session: &PracticeSession) -> CandidateContext {
    CandidateContext {
        resume: session.resume.clone(),
        job_description: session.job_description.clone(),
        candidate_analysis: session.candidate_analysis.clone(),
    }
}

fn average_score(responses: &[Response]) -> Option<f64> {
    if responses.is_empty() {
        return None;
    }
    let total: u32 = responses.iter().map(|r| u32::from(r.evaluation.score)).sum();
    Some(f64::from(total) / responses.len() as f64)
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/questions/generate
///
/// Generates questions with the model and stores each one.
pub async fn handle_generate_questions(
    State(state): State<AppState>,
    AppJson(request): AppJson<GenerateQuestionsRequest>,
) -> Result<Json<Envelope<GeneratedQuestions>>, AppError> {
    let subject = request.subject.trim();
    if subject.is_empty() {
        return Err(AppError::Validation("Subject is required".to_string()));
    }
    let count = request.count.unwrap_or(DEFAULT_QUESTION_COUNT);
    if !(1..=MAX_QUESTION_COUNT).contains(&count) {
        return Err(AppError::Validation(format!(
            "count must be between 1 and {MAX_QUESTION_COUNT}"
        )));
    }
    let question_type =
        parse_question_type(request.question_type.as_deref())?.unwrap_or_default();

    let generation = GenerationRequest {
        subject: subject.to_string(),
        count,
        question_type,
        context: CandidateContext {
            resume: request.resume,
            job_description: request.job_description,
            candidate_analysis: request.candidate_analysis,
        },
    };

    let (generated, fallback) = match generate_questions(state.llm.as_ref(), &generation).await {
        Ok(generated) => (generated, false),
        Err(LlmError::Malformed(e)) if request.allow_fallback => {
            warn!("Using fallback questions for \"{subject}\": {e}");
            (fallback_questions(subject, count, question_type), true)
        }
        Err(e) => return Err(e.into()),
    };

    let mut questions = Vec::with_capacity(generated.len());
    for q in generated {
        let stored = state
            .repo
            .create_question(NewQuestion {
                question: q.question,
                question_type: q.question_type,
                category: q.category,
            })
            .await?;
        questions.push(stored);
    }

    Ok(Envelope::ok(GeneratedQuestions {
        questions,
        fallback,
    }))
}

/// GET /api/questions
pub async fn handle_list_questions(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListQuestionsQuery>,
) -> Result<Json<Envelope<QuestionList>>, AppError> {
    let questions = state
        .repo
        .questions(query.category.as_deref(), list_limit(query.limit))
        .await?;
    Ok(Envelope::ok(QuestionList { questions }))
}

/// POST /api/sessions/create
pub async fn handle_create_session(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateSessionRequest>,
) -> Result<Json<Envelope<SessionBody>>, AppError> {
    let question_ids = request
        .question_ids
        .iter()
        .map(|id| parse_id("questionIds", Some(id)))
        .collect::<Result<Vec<_>, _>>()?;

    let session = state
        .repo
        .create_session(NewSession {
            title: request.title,
            subject: request.subject,
            total_questions: request.total_questions.unwrap_or(0),
            resume: request.resume,
            job_description: request.job_description,
            candidate_analysis: request.candidate_analysis,
            question_ids,
        })
        .await?;

    Ok(Envelope::ok(SessionBody { session }))
}

/// GET /api/sessions
pub async fn handle_list_sessions(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListSessionsQuery>,
) -> Result<Json<Envelope<SessionList>>, AppError> {
    let sessions = state.repo.sessions(list_limit(query.limit)).await?;
    Ok(Envelope::ok(SessionList { sessions }))
}

/// GET /api/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<SessionBody>>, AppError> {
    let id = parse_id("session id", Some(&id))?;
    let session = state.repo.session(id).await?;
    Ok(Envelope::ok(SessionBody { session }))
}

/// GET /api/sessions/:id/results
///
/// The session with every stored response, oldest first.
pub async fn handle_session_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<SessionResultsBody>>, AppError> {
    let id = parse_id("session id", Some(&id))?;
    let session = state.repo.session(id).await?;
    let responses = state.repo.responses(id).await?;
    let average_score = average_score(&responses);

    Ok(Envelope::ok(SessionResultsBody {
        session: SessionResults {
            is_complete: session.is_complete(),
            session,
            responses,
            average_score,
        },
    }))
}

/// POST /api/responses/evaluate
///
/// Scores one answer and stores it as a response. The answer is the
/// transcription when present, otherwise the typed text.
pub async fn handle_evaluate_response(
    State(state): State<AppState>,
    AppJson(request): AppJson<EvaluateRequest>,
) -> Result<Json<Envelope<EvaluateBody>>, AppError> {
    let session_id = parse_id("sessionId", request.session_id.as_deref())?;
    let question_id = parse_id("questionId", request.question_id.as_deref())?;
    let question_text = request.question_text.trim();
    if question_text.is_empty() {
        return Err(AppError::Validation("questionText is required".to_string()));
    }
    let answer = [&request.transcription, &request.text_response]
        .into_iter()
        .flatten()
        .map(|a| a.trim())
        .find(|a| !a.is_empty())
        .ok_or_else(|| {
            AppError::Validation("textResponse or transcription is required".to_string())
        })?
        .to_string();
    let requested_type = parse_question_type(request.question_type.as_deref())?;

    // Check references before spending a model call.
    let session = state.repo.session(session_id).await?;
    let question = state.repo.question(question_id).await?;
    let context = context_of(&session);

    let input = EvaluationInput {
        question: question_text,
        answer: &answer,
        question_type: requested_type.unwrap_or(question.question_type),
        context: &context,
    };
    let (evaluation, fallback) = match evaluate_answer(state.llm.as_ref(), &input).await {
        Ok(evaluation) => (evaluation, false),
        Err(LlmError::Malformed(e)) if request.allow_fallback => {
            warn!("Using fallback evaluation for question {question_id}: {e}");
            (fallback_evaluation(), true)
        }
        Err(e) => return Err(e.into()),
    };

    let (response, session) = state
        .repo
        .create_response(NewResponse {
            session_id,
            question_id,
            question_text: question_text.to_string(),
            audio_url: request.audio_url,
            video_url: request.video_url,
            text_response: request.text_response,
            transcription: request.transcription,
            evaluation: evaluation.clone(),
        })
        .await?;

    Ok(Envelope::ok(EvaluateBody {
        response,
        evaluation,
        fallback,
        session,
    }))
}

/// GET /api/responses/:id
pub async fn handle_get_response(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<ResponseBody>>, AppError> {
    let id = parse_id("response id", Some(&id))?;
    let response = state.repo.response(id).await?;
    Ok(Envelope::ok(ResponseBody { response }))
}

/// POST /api/clarification
pub async fn handle_clarification(
    State(state): State<AppState>,
    AppJson(request): AppJson<ClarificationRequest>,
) -> Result<Json<Envelope<ClarificationBody>>, AppError> {
    let clarifying = request.clarifying_question.trim();
    let interview = request.interview_question.trim();
    if clarifying.is_empty() || interview.is_empty() {
        return Err(AppError::Validation(
            "clarifyingQuestion and interviewQuestion are required".to_string(),
        ));
    }

    let guidance = clarify(state.llm.as_ref(), interview, clarifying).await?;
    Ok(Envelope::ok(ClarificationBody { guidance }))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::SubScores;

    fn response_with_score(score: u8) -> Response {
        Response {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            question_id: Uuid::new_v4(),
            question_text: "q".into(),
            audio_url: None,
            video_url: None,
            text_response: Some("a".into()),
            transcription: None,
            evaluation: Evaluation {
                score,
                feedback: "f".into(),
                strengths: vec![],
                improvements: vec![],
                timeline_analysis: SubScores::uniform(5),
                fallback: false,
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_average_score() {
        assert_eq!(average_score(&[]), None);
        let responses = [response_with_score(80), response_with_score(91)];
        assert_eq!(average_score(&responses), Some(85.5));
    }

    #[test]
    fn test_parse_id_errors_are_validation() {
        assert!(matches!(parse_id("sessionId", None), Err(AppError::Validation(_))));
        assert!(matches!(parse_id("sessionId", Some("  ")), Err(AppError::Validation(_))));
        assert!(matches!(
            parse_id("sessionId", Some("not-a-uuid")),
            Err(AppError::Validation(_))
        ));
        let id = Uuid::new_v4();
        assert_eq!(parse_id("sessionId", Some(&id.to_string())).unwrap(), id);
    }

    #[test]
    fn test_parse_question_type() {
        assert_eq!(parse_question_type(None).unwrap(), None);
        assert_eq!(
            parse_question_type(Some("SQL_Query_Writing")).unwrap(),
            Some(QuestionType::SqlQueryWriting)
        );
        assert!(matches!(
            parse_question_type(Some("trivia")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_list_limit_is_bounded() {
        assert_eq!(list_limit(None), DEFAULT_LIST_LIMIT);
        assert_eq!(list_limit(Some(0)), 1);
        assert_eq!(list_limit(Some(10_000)), MAX_LIST_LIMIT);
    }
}
