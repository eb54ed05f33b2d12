use tracing::debug;

use crate::interview::prompts::{CLARIFICATION_SYSTEM, CLARIFICATION_TEMPLATE};
use crate::llm_client::{ChatModel, ChatRequest, LlmError};

pub const NO_GUIDANCE: &str = "Unable to generate guidance at this time.";

/// Coaching reply to a candidate's clarifying question. Plain text, never the answer itself.
pub async fn clarify(
    model: &dyn ChatModel,
    interview_question: &str,
    clarifying_question: &str,
) -> Result<String, LlmError> {
    let prompt = CLARIFICATION_TEMPLATE
        .replace("{interview_question}", interview_question)
        .replace("{clarifying_question}", clarifying_question);
    let chat = ChatRequest::new(CLARIFICATION_SYSTEM)
        .user(&prompt)
        .temperature(0.7)
        .max_tokens(500);

    let guidance = match model.complete(chat).await {
        Ok(text) => text.trim().to_string(),
        Err(LlmError::EmptyContent) => String::new(),
        Err(e) => return Err(e),
    };
    debug!("Clarification guidance: {} chars", guidance.len());

    if guidance.is_empty() {
        return Ok(NO_GUIDANCE.to_string());
    }
    Ok(guidance)
}
