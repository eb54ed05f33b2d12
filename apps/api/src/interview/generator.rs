//! Question generation: prompt the model for a batch of questions of one type
//! and turn whatever JSON it returns into clean records.
//!
//! Accepts either `{"questions": [...]}` or a bare array. Items with no
//! question text are dropped; an answer with no usable item is malformed.

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::interview::prompts::{question_prompt, CandidateContext};
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::recovery::{JsonShape, RecoveryError};
use crate::llm_client::{complete_json, ChatModel, ChatRequest, LlmError};
use crate::models::QuestionType;

pub const DEFAULT_QUESTION_COUNT: u32 = 5;
pub const MAX_QUESTION_COUNT: u32 = 20;

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub subject: String,
    pub count: u32,
    pub question_type: QuestionType,
    pub context: CandidateContext,
}

/// A generated question before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedQuestion {
    pub question: String,
    pub question_type: QuestionType,
    pub category: String,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(default)]
    question: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

pub async fn generate_questions(
    model: &dyn ChatModel,
    request: &GenerationRequest,
) -> Result<Vec<GeneratedQuestion>, LlmError> {
    let prompt = question_prompt(
        request.question_type,
        request.count,
        &request.subject,
        &request.context,
    );
    let chat = ChatRequest::new(JSON_ONLY_SYSTEM)
        .user(&prompt)
        .temperature(0.7)
        .max_tokens(2000);

    let value: Value = complete_json(model, chat, JsonShape::Any).await?;
    let questions = questions_from_value(value, request)?;

    if questions.len() < request.count as usize {
        warn!(
            "Model returned {} of {} requested {} questions",
            questions.len(),
            request.count,
            request.question_type
        );
    }
    info!(
        "Generated {} {} questions for \"{}\"",
        questions.len(),
        request.question_type,
        request.subject
    );
    Ok(questions)
}

fn questions_from_value(
    value: Value,
    request: &GenerationRequest,
) -> Result<Vec<GeneratedQuestion>, RecoveryError> {
    let excerpt = || value.to_string().chars().take(120).collect::<String>();
    let items = match &value {
        Value::Array(items) => items.clone(),
        Value::Object(map) => match map.get("questions") {
            Some(Value::Array(items)) => items.clone(),
            _ => {
                return Err(RecoveryError::Malformed {
                    reason: "object has no \"questions\" array".to_string(),
                    excerpt: excerpt(),
                })
            }
        },
        _ => {
            return Err(RecoveryError::Malformed {
                reason: "expected an object or array of questions".to_string(),
                excerpt: excerpt(),
            })
        }
    };

    let questions: Vec<GeneratedQuestion> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RawQuestion>(item).ok())
        .filter(|raw| !raw.question.trim().is_empty())
        .take(request.count as usize)
        .map(|raw| GeneratedQuestion {
            question: raw.question.trim().to_string(),
            question_type: raw
                .kind
                .as_deref()
                .and_then(QuestionType::parse)
                .unwrap_or(request.question_type),
            category: raw
                .category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| request.subject.clone()),
        })
        .collect();

    if questions.is_empty() {
        return Err(RecoveryError::Malformed {
            reason: "no usable questions in model output".to_string(),
            excerpt: excerpt(),
        });
    }
    Ok(questions)
}

/// Placeholder questions used when the caller opted into fallback content.
pub fn fallback_questions(
    subject: &str,
    count: u32,
    question_type: QuestionType,
) -> Vec<GeneratedQuestion> {
    (1..=count)
        .map(|i| GeneratedQuestion {
            question: format!("Sample {question_type} question {i} about {subject}"),
            question_type,
            category: subject.to_string(),
        })
        .collect()
}
