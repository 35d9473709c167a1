//! LLM client: the single point of entry for all model provider calls.
//!
//! ARCHITECTURAL RULE: No other module may call the provider API directly.
//! All LLM interactions MUST go through the `ChatModel` trait.
//!
//! Speaks the OpenAI-compatible chat completions protocol (Groq by default).
//! This layer never retries; see `analysis::service::complete_with_retry`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::CompletionProfile;

pub mod prompts;
#[cfg(test)]
pub mod stub;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned no completion choices")]
    EmptyContent,
}

impl LlmError {
    /// Network failures, timeouts, rate limits and provider-side 5xx are worth another attempt.
    /// Auth and request errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Http(_) => true,
            LlmError::Api { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            LlmError::Parse(_) | LlmError::EmptyContent => false,
        }
    }
}

/// A chat model that turns one prompt into one completion string.
///
/// Carried in `AppState` as `Arc<dyn ChatModel>` so handlers never construct clients.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str, profile: &CompletionProfile)
        -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatResponse {
    /// Content of the first choice. A `null` content is an empty completion, not an error.
    pub fn into_text(self) -> Result<String, LlmError> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or(LlmError::EmptyContent)
    }
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

/// HTTP client for an OpenAI-compatible `/chat/completions` endpoint.
/// Built once at startup; cloning shares the underlying connection pool.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    completions_url: String,
}

impl LlmClient {
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            completions_url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(
        &self,
        prompt: &str,
        profile: &CompletionProfile,
    ) -> Result<String, LlmError> {
        let request_body = ChatRequest {
            model: &profile.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: profile.temperature,
            max_tokens: profile.max_tokens,
        };

        let response = self
            .client
            .post(&self.completions_url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: provider_error_message(body),
            });
        }

        let body = response.text().await?;
        let chat: ChatResponse = serde_json::from_str(&body)?;

        if let Some(usage) = &chat.usage {
            debug!(
                "LLM call succeeded: model={}, prompt_tokens={}, completion_tokens={}",
                profile.model, usage.prompt_tokens, usage.completion_tokens
            );
        }

        chat.into_text()
    }
}

/// Pulls `error.message` out of a provider error body, falling back to the raw body.
fn provider_error_message(body: String) -> String {
    serde_json::from_str::<ProviderError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::HeaderMap,
        response::{IntoResponse, Response},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};

    async fn fake_completions(headers: HeaderMap, Json(body): Json<Value>) -> Response {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer test-key");
        if !authorized {
            let error = json!({"error": {"message": "Invalid API Key", "type": "invalid_request_error"}});
            return (axum::http::StatusCode::UNAUTHORIZED, Json(error)).into_response();
        }

        let content = format!(
            "model={} t={}",
            body["model"].as_str().unwrap_or_default(),
            body["temperature"]
        );
        Json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2}
        }))
        .into_response()
    }

    async fn slow_completions() -> Json<Value> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Json(json!({"choices": []}))
    }

    /// Serves a local OpenAI-compatible endpoint and returns its origin.
    async fn spawn_provider() -> String {
        let app = Router::new()
            .route("/v1/chat/completions", post(fake_completions))
            .route("/slow/v1/chat/completions", post(slow_completions));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    fn profile() -> CompletionProfile {
        CompletionProfile {
            model: "test-model".to_string(),
            temperature: 0.2,
            max_tokens: 16,
        }
    }

    #[tokio::test]
    async fn test_complete_posts_to_trimmed_base_url() {
        let origin = spawn_provider().await;
        let client = LlmClient::new(
            "test-key".to_string(),
            &format!("{origin}/v1/"),
            Duration::from_secs(5),
        )
        .unwrap();

        let text = client.complete("hello", &profile()).await.unwrap();
        assert_eq!(text, "model=test-model t=0.2");
    }

    #[tokio::test]
    async fn test_complete_maps_rejection_to_api_error() {
        let origin = spawn_provider().await;
        let client = LlmClient::new(
            "wrong-key".to_string(),
            &format!("{origin}/v1"),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = client.complete("hello", &profile()).await.unwrap_err();
        match &err {
            LlmError::Api { status, message } => {
                assert_eq!(*status, 401);
                assert_eq!(message, "Invalid API Key");
            }
            other => panic!("expected an API error, got {other:?}"),
        }
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_complete_timeout_is_transient() {
        let origin = spawn_provider().await;
        let client = LlmClient::new(
            "test-key".to_string(),
            &format!("{origin}/slow/v1"),
            Duration::from_millis(100),
        )
        .unwrap();

        let err = client.complete("hello", &profile()).await.unwrap_err();
        assert!(matches!(err, LlmError::Http(ref e) if e.is_timeout()));
        assert!(err.is_transient());
    }

    #[test]
    fn test_into_text_takes_first_choice() {
        let json = r#"{
            "choices": [
                {"message": {"role": "assistant", "content": "first"}},
                {"message": {"role": "assistant", "content": "second"}}
            ],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
        }"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.into_text().unwrap(), "first");
    }

    #[test]
    fn test_null_content_is_empty_string() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.into_text().unwrap(), "");
    }

    #[test]
    fn test_no_choices_is_empty_content_error() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(response.into_text(), Err(LlmError::EmptyContent)));
    }

    #[test]
    fn test_provider_error_message_extracted() {
        let body = r#"{"error": {"message": "Invalid API Key", "type": "invalid_request_error"}}"#;
        assert_eq!(provider_error_message(body.to_string()), "Invalid API Key");
    }

    #[test]
    fn test_provider_error_message_falls_back_to_body() {
        assert_eq!(
            provider_error_message("upstream timeout".to_string()),
            "upstream timeout"
        );
    }

    #[test]
    fn test_transient_classification() {
        let rate_limited = LlmError::Api {
            status: 429,
            message: String::new(),
        };
        let unavailable = LlmError::Api {
            status: 503,
            message: String::new(),
        };
        let unauthorized = LlmError::Api {
            status: 401,
            message: String::new(),
        };
        assert!(rate_limited.is_transient());
        assert!(unavailable.is_transient());
        assert!(!unauthorized.is_transient());
        assert!(!LlmError::EmptyContent.is_transient());
    }

    #[test]
    fn test_request_serializes_single_user_message() {
        let body = ChatRequest {
            model: "llama-3.3-70b-versatile",
            messages: vec![ChatMessage {
                role: "user",
                content: "hello",
            }],
            temperature: 0.2,
            max_tokens: 900,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], "llama-3.3-70b-versatile");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hello");
        assert_eq!(value["max_tokens"], 900);
    }
}
