//! Answer evaluation. The model's JSON is read loosely (numbers may arrive as
//! floats or strings) and clamped: overall score to 0–100, sub-scores to 1–10.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::interview::prompts::{evaluation_prompt, CandidateContext};
use crate::llm_client::recovery::{JsonShape, RecoveryError};
use crate::llm_client::{complete_json, ChatModel, ChatRequest, LlmError};
use crate::models::{Evaluation, QuestionType, SubScores};

const FALLBACK_SCORE: u8 = 75;
const FALLBACK_SUB_SCORE: u8 = 7;
pub const FALLBACK_FEEDBACK: &str = "Unable to parse AI evaluation. Please try again.";

#[derive(Debug, Clone)]
pub struct EvaluationInput<'a> {
    pub question: &'a str,
    pub answer: &'a str,
    pub question_type: QuestionType,
    pub context: &'a CandidateContext,
}

#[derive(Debug, Deserialize)]
struct RawEvaluation {
    score: Option<Value>,
    #[serde(default)]
    feedback: Option<String>,
    #[serde(default)]
    strengths: Vec<Value>,
    #[serde(default)]
    improvements: Vec<Value>,
    #[serde(default)]
    timeline_analysis: HashMap<String, Value>,
}

pub async fn evaluate_answer(
    model: &dyn ChatModel,
    input: &EvaluationInput<'_>,
) -> Result<Evaluation, LlmError> {
    let system = evaluation_prompt(input.question_type, input.context);
    let user = format!(
        "Question: {}\n\nResponse: {}\n\nPlease evaluate this response.",
        input.question, input.answer
    );
    let chat = ChatRequest::new(&system)
        .user(&user)
        .temperature(0.3)
        .max_tokens(1000);

    let raw: RawEvaluation = complete_json(model, chat, JsonShape::Object).await?;
    let evaluation = into_evaluation(raw)?;
    info!(
        "Evaluated {} answer: score {}, sub-score mean {:.1}",
        input.question_type,
        evaluation.score,
        evaluation.timeline_analysis.mean()
    );
    Ok(evaluation)
}

fn into_evaluation(raw: RawEvaluation) -> Result<Evaluation, RecoveryError> {
    let score = raw.score.as_ref().and_then(number).ok_or_else(|| RecoveryError::Malformed {
        reason: "evaluation has no numeric \"score\"".to_string(),
        excerpt: format!("{:?}", raw.score),
    })?;
    let score = score.round().clamp(0.0, 100.0) as u8;

    // Missing sub-scores are derived from the overall score.
    let derived = ((f64::from(score) / 10.0).round() as u8).clamp(1, 10);
    let sub = |name: &str| {
        raw.timeline_analysis
            .get(name)
            .and_then(number)
            .map(|v| v.round().clamp(1.0, 10.0) as u8)
            .unwrap_or(derived)
    };

    Ok(Evaluation {
        score,
        feedback: raw
            .feedback
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| "No feedback provided.".to_string()),
        strengths: strings(raw.strengths),
        improvements: strings(raw.improvements),
        timeline_analysis: SubScores {
            clarity: sub("clarity"),
            confidence: sub("confidence"),
            technical_depth: sub("technical_depth"),
            communication: sub("communication"),
            structure: sub("structure"),
            engagement: sub("engagement"),
            completeness: sub("completeness"),
        },
        fallback: false,
    })
}

fn number(value: &Value) -> Option<f64> {
    let n: Option<f64> = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    };
    n.filter(|v| v.is_finite())
}

fn strings(values: Vec<Value>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
        .collect()
}

/// Placeholder evaluation for callers that opted into fallback content.
pub fn fallback_evaluation() -> Evaluation {
    Evaluation {
        score: FALLBACK_SCORE,
        feedback: FALLBACK_FEEDBACK.to_string(),
        strengths: vec!["Response provided".to_string()],
        improvements: vec!["Try again for detailed feedback".to_string()],
        timeline_analysis: SubScores::uniform(FALLBACK_SUB_SCORE),
        fallback: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedModel;

    async fn evaluate(reply: &str) -> Result<Evaluation, LlmError> {
        let model = ScriptedModel::always(reply);
        let context = CandidateContext::default();
        let input = EvaluationInput {
            question: "Tell me about a conflict.",
            answer: "I listened first, then we agreed on a plan.",
            question_type: QuestionType::Behavioral,
            context: &context,
        };
        evaluate_answer(&model, &input).await
    }

    #[tokio::test]
    async fn test_full_evaluation_is_read() {
        let evaluation = evaluate(
            r#"{"score": 82, "feedback": "Solid STAR structure.",
                "strengths": ["Clear situation"], "improvements": ["Quantify the result"],
                "timeline_analysis": {"clarity": 8, "confidence": 7, "technical_depth": 5,
                  "communication": 9, "structure": 8, "engagement": 6, "completeness": 7}}"#,
        )
        .await
        .unwrap();
        assert_eq!(evaluation.score, 82);
        assert_eq!(evaluation.timeline_analysis.communication, 9);
        assert_eq!(evaluation.timeline_analysis.technical_depth, 5);
        assert_eq!(evaluation.strengths, vec!["Clear situation"]);
        assert!(!evaluation.fallback);
    }

    #[tokio::test]
    async fn test_scores_are_clamped() {
        let evaluation = evaluate(
            r#"{"score": 140.6, "feedback": "x",
                "timeline_analysis": {"clarity": 0, "confidence": 12, "technical_depth": "6.4"}}"#,
        )
        .await
        .unwrap();
        assert_eq!(evaluation.score, 100);
        assert_eq!(evaluation.timeline_analysis.clarity, 1);
        assert_eq!(evaluation.timeline_analysis.confidence, 10);
        assert_eq!(evaluation.timeline_analysis.technical_depth, 6);
        // Missing sub-scores follow the overall score.
        assert_eq!(evaluation.timeline_analysis.engagement, 10);
    }

    #[tokio::test]
    async fn test_string_score_and_fenced_output() {
        let evaluation = evaluate("```json\n{\"score\": \"64\", \"feedback\": \"ok\"}\n```")
            .await
            .unwrap();
        assert_eq!(evaluation.score, 64);
        assert_eq!(evaluation.timeline_analysis.clarity, 6);
        assert!(evaluation.improvements.is_empty());
    }

    #[tokio::test]
    async fn test_missing_score_is_malformed() {
        let err = evaluate(r#"{"feedback": "Great answer"}"#).await.unwrap_err();
        assert!(matches!(err, LlmError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_prose_is_malformed() {
        let err = evaluate("The candidate did well overall.").await.unwrap_err();
        assert!(matches!(err, LlmError::Malformed(_)));
    }

    #[test]
    fn test_fallback_evaluation_is_flagged() {
        let evaluation = fallback_evaluation();
        assert!(evaluation.fallback);
        assert_eq!(evaluation.score, 75);
        assert_eq!(evaluation.timeline_analysis, SubScores::uniform(7));
        assert_eq!(evaluation.feedback, FALLBACK_FEEDBACK);
    }
}
