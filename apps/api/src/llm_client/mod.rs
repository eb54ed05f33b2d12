//! LLM client: the single point of entry for all chat-completion calls.
//!
//! ARCHITECTURAL RULE: No other module may call the Groq API directly.
//! All LLM interactions MUST go through the `ChatModel` trait defined here.
//!
//! Model: llama-3.1-8b-instant (hardcoded, not configurable)
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;
pub mod recovery;

use recovery::{recover_json, JsonShape, RecoveryError};

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
/// The model used for all LLM calls.
pub const MODEL: &str = "llama-3.1-8b-instant";
const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("GROQ_API_KEY is not configured")]
    NotConfigured,

    #[error(transparent)]
    Malformed(#[from] RecoveryError),
}

/// One chat-completion call: a system prompt, an optional user turn and sampling settings.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub system: &'a str,
    pub user: Option<&'a str>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl<'a> ChatRequest<'a> {
    pub fn new(system: &'a str) -> Self {
        Self {
            system,
            user: None,
            temperature: 0.7,
            max_tokens: 1000,
        }
    }

    pub fn user(mut self, user: &'a str) -> Self {
        self.user = Some(user);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A chat model that turns a prompt into generated text.
///
/// Carried in `AppState` as `Arc<dyn ChatModel>` so handlers can be driven by a
/// scripted model in tests.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: ChatRequest<'_>) -> Result<String, LlmError>;
}

/// Calls the model and recovers a typed JSON value from its text output.
/// The prompt must instruct the model to return JSON of the given shape.
pub async fn complete_json<T: DeserializeOwned>(
    model: &dyn ChatModel,
    request: ChatRequest<'_>,
    shape: JsonShape,
) -> Result<T, LlmError> {
    let text = model.complete(request).await?;
    Ok(recover_json(&text, shape)?)
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Groq chat-completions client (OpenAI-compatible wire format) with retry logic.
#[derive(Clone)]
pub struct GroqClient {
    client: Client,
    api_key: String,
}

impl GroqClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            api_key,
        })
    }
}

#[async_trait]
impl ChatModel for GroqClient {
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    async fn complete(&self, request: ChatRequest<'_>) -> Result<String, LlmError> {
        let mut messages = vec![Message {
            role: "system",
            content: request.system,
        }];
        if let Some(user) = request.user {
            messages.push(Message {
                role: "user",
                content: user,
            });
        }
        let body = CompletionRequest {
            model: MODEL,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(GROQ_API_URL)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let text = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, text);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: text,
                });
                continue;
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiErrorEnvelope>(&text)
                    .map(|e| e.error.message)
                    .unwrap_or(text);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let completion: CompletionResponse = response.json().await?;

            if let Some(usage) = &completion.usage {
                debug!(
                    "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                    usage.prompt_tokens, usage.completion_tokens
                );
            }

            return completion
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .filter(|c| !c.trim().is_empty())
                .ok_or(LlmError::EmptyContent);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

/// Stand-in used when no API key is configured. Every call fails fast so
/// handlers can answer 503 instead of attempting an unauthenticated request.
pub struct UnconfiguredModel;

#[async_trait]
impl ChatModel for UnconfiguredModel {
    async fn complete(&self, _request: ChatRequest<'_>) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured)
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted model for driving generation and handler tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replies with queued outputs in order; the last output repeats once the queue drains.
    pub struct ScriptedModel {
        replies: Mutex<VecDeque<String>>,
        last: Mutex<String>,
    }

    impl ScriptedModel {
        pub fn new<I, S>(replies: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
                last: Mutex::new(String::new()),
            }
        }

        pub fn always(reply: &str) -> Self {
            Self::new([reply])
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, _request: ChatRequest<'_>) -> Result<String, LlmError> {
            let next = self.replies.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(reply) = next {
                *last = reply;
            }
            if last.is_empty() {
                return Err(LlmError::EmptyContent);
            }
            Ok(last.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedModel;
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Keyed {
        key: String,
    }

    #[test]
    fn test_chat_request_builder_defaults() {
        let req = ChatRequest::new("system").user("hi").temperature(0.3);
        assert_eq!(req.system, "system");
        assert_eq!(req.user, Some("hi"));
        assert!((req.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(req.max_tokens, 1000);
    }

    #[tokio::test]
    async fn test_unconfigured_model_fails_fast() {
        let err = UnconfiguredModel
            .complete(ChatRequest::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured));
    }

    #[tokio::test]
    async fn test_complete_json_recovers_fenced_output() {
        let model = ScriptedModel::always("```json\n{\"key\": \"value\"}\n```");
        let keyed: Keyed = complete_json(&model, ChatRequest::new("x"), JsonShape::Object)
            .await
            .unwrap();
        assert_eq!(keyed.key, "value");
    }

    #[tokio::test]
    async fn test_complete_json_surfaces_malformed_output() {
        let model = ScriptedModel::always("I cannot help with that.");
        let result: Result<Keyed, _> =
            complete_json(&model, ChatRequest::new("x"), JsonShape::Object).await;
        assert!(matches!(result, Err(LlmError::Malformed(_))));
    }
}
