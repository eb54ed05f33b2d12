// Shared prompt constants used by more than one caller.
// Each feature that needs LLM calls defines its own prompts alongside it.

/// System prompt that enforces JSON-only output. Templates that describe their
/// own schema are sent as the user turn underneath this.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant for interview practice. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Shared response-format block for every evaluator template.
pub const EVALUATION_FORMAT: &str = r#"**Response Format:**
Return ONLY a valid JSON object with this exact structure:
{
  "score": number (0-100),
  "feedback": "Detailed feedback explaining the score",
  "strengths": ["strength1", "strength2"],
  "improvements": ["improvement1", "improvement2"],
  "timeline_analysis": {
    "clarity": number (1-10),
    "confidence": number (1-10),
    "technical_depth": number (1-10),
    "communication": number (1-10),
    "structure": number (1-10),
    "engagement": number (1-10),
    "completeness": number (1-10)
  }
}

Do NOT include any other text or formatting. Only return the JSON object."#;
