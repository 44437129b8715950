use crate::models::{Message, Role};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-pro";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// How many prior turns are forwarded alongside a new message.
pub const HISTORY_WINDOW: usize = 5;

const MAX_OUTPUT_TOKENS: u32 = 1000;
const TEMPERATURE: f64 = 0.7;

/// Classified failure of a completion call. `user_message` renders each
/// variant as text safe to show as an assistant turn.
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("API key is not configured")]
    MissingApiKey,

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("model rejected the request: {0}")]
    ModelError(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl CompletionError {
    /// Human-readable text for an in-conversation error turn.
    pub fn user_message(&self) -> String {
        match self {
            CompletionError::MissingApiKey => {
                "AI service unavailable. Check API key.".to_string()
            }
            CompletionError::QuotaExceeded(_) => {
                "The AI service quota has been exceeded. Please try again in a little while."
                    .to_string()
            }
            CompletionError::ModelError(_) => {
                "The AI model rejected the request. Please try rephrasing your message."
                    .to_string()
            }
            CompletionError::Http(_) => {
                "I couldn't reach the AI service. Please check your connection and try again."
                    .to_string()
            }
            CompletionError::Api(_) | CompletionError::MalformedResponse(_) => {
                "I apologize, but I encountered an issue. Please try again.".to_string()
            }
        }
    }
}

// Trait defining the interface for completion providers; the dispatcher and
// the tests depend on this seam rather than on a concrete backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generates a reply to `message`, given the prior conversation turns.
    async fn complete(
        &self,
        message: &str,
        history: &[Message],
    ) -> Result<String, CompletionError>;
}

// --- Gemini provider implementation ---

pub struct GeminiProvider {
    client: Client,
    base_url: String,
    model: String,
    // Absent key leaves the provider in an always-failing degraded state
    // instead of refusing to start.
    api_key: Option<String>,
}

impl GeminiProvider {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            api_key,
        }
    }

    /// Points the provider at a different endpoint (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Builds the generateContent request body: the last few prior turns
    /// plus the new message, with the assistant role renamed to the
    /// provider's "model" vocabulary.
    pub fn build_payload(message: &str, history: &[Message]) -> Value {
        let start = history.len().saturating_sub(HISTORY_WINDOW);
        let mut contents: Vec<Value> = history[start..]
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::Assistant => "model",
                    Role::User => "user",
                };
                json!({
                    "role": role,
                    "parts": [{ "text": msg.content }],
                })
            })
            .collect();

        contents.push(json!({
            "role": "user",
            "parts": [{ "text": message }],
        }));

        json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": MAX_OUTPUT_TOKENS,
                "temperature": TEMPERATURE,
            },
        })
    }

    // Classification leans on the HTTP status first and only falls back to
    // matching the error-body message.
    fn classify_failure(status: StatusCode, body: &str) -> CompletionError {
        let detail = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(|s| s.to_string()))
            .unwrap_or_else(|| format!("HTTP {}: {}", status, body));

        let lowered = detail.to_lowercase();
        if status == StatusCode::TOO_MANY_REQUESTS
            || lowered.contains("quota")
            || lowered.contains("rate limit")
        {
            CompletionError::QuotaExceeded(detail)
        } else if status.is_client_error() {
            CompletionError::ModelError(detail)
        } else {
            CompletionError::Api(detail)
        }
    }

    fn extract_text(value: &Value) -> Option<String> {
        value["candidates"][0]["content"]["parts"]
            .as_array()
            .and_then(|parts| parts.iter().find_map(|part| part["text"].as_str()))
            .map(|s| s.to_string())
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    async fn complete(
        &self,
        message: &str,
        history: &[Message],
    ) -> Result<String, CompletionError> {
        let Some(api_key) = self.api_key.as_deref() else {
            log::warn!("Completion requested but no API key is configured");
            return Err(CompletionError::MissingApiKey);
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            self.model,
            api_key
        );
        let payload = Self::build_payload(message, history);

        log::info!(
            "Sending completion request to model {} with {} history turns",
            self.model,
            history.len().min(HISTORY_WINDOW)
        );
        let response = self.client.post(&url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = Self::classify_failure(status, &body);
            log::error!("Completion request failed ({}): {}", status, err);
            return Err(err);
        }

        let value: Value = response.json().await?;
        if let Some(error) = value.get("error") {
            let detail = error["message"].as_str().unwrap_or("unknown error");
            return Err(CompletionError::Api(detail.to_string()));
        }

        Self::extract_text(&value).ok_or_else(|| {
            CompletionError::MalformedResponse("response carried no candidate text".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn turn(role: Role, content: &str) -> Message {
        Message::new(role, content, Utc::now())
    }

    #[test]
    fn payload_maps_assistant_role_to_model() {
        let history = vec![
            turn(Role::User, "Hi"),
            turn(Role::Assistant, "Hello!"),
        ];
        let payload = GeminiProvider::build_payload("How are you?", &history);
        let contents = payload["contents"].as_array().unwrap();

        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(contents[2]["parts"][0]["text"], "How are you?");
    }

    #[test]
    fn payload_keeps_only_the_last_five_turns() {
        let history: Vec<Message> = (0..8)
            .map(|i| turn(Role::User, &format!("turn {}", i)))
            .collect();
        let payload = GeminiProvider::build_payload("latest", &history);
        let contents = payload["contents"].as_array().unwrap();

        // 5 history turns + the new message.
        assert_eq!(contents.len(), HISTORY_WINDOW + 1);
        assert_eq!(contents[0]["parts"][0]["text"], "turn 3");
    }

    #[test]
    fn payload_carries_generation_config() {
        let payload = GeminiProvider::build_payload("Hello", &[]);
        assert_eq!(payload["generationConfig"]["maxOutputTokens"], 1000);
        assert_eq!(payload["generationConfig"]["temperature"], 0.7);
    }

    #[test]
    fn classify_prefers_status_over_message() {
        let err = GeminiProvider::classify_failure(
            StatusCode::TOO_MANY_REQUESTS,
            "{\"error\":{\"message\":\"Resource exhausted\"}}",
        );
        assert!(matches!(err, CompletionError::QuotaExceeded(_)));

        let err = GeminiProvider::classify_failure(
            StatusCode::NOT_FOUND,
            "{\"error\":{\"message\":\"model not found\"}}",
        );
        assert!(matches!(err, CompletionError::ModelError(_)));

        let err = GeminiProvider::classify_failure(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(matches!(err, CompletionError::Api(_)));
    }

    #[test]
    fn classify_falls_back_to_message_matching() {
        let err = GeminiProvider::classify_failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "{\"error\":{\"message\":\"Quota exceeded for project\"}}",
        );
        assert!(matches!(err, CompletionError::QuotaExceeded(_)));
    }

    #[tokio::test]
    async fn missing_key_degrades_to_descriptive_error() {
        let provider = GeminiProvider::new(None, DEFAULT_MODEL);
        let err = provider.complete("Hello", &[]).await.unwrap_err();
        assert!(matches!(err, CompletionError::MissingApiKey));
        assert!(err.user_message().contains("API key"));
    }
}
