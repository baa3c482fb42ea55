//! OpenAI-compatible chat completions over HTTP
//!
//! Posts to `{base_url}/chat/completions` with a bearer token and JSON output
//! mode. Any OpenAI-compatible gateway works by pointing `base_url` at it.
//!
//! Upstream error bodies are logged but never copied into the returned error,
//! since they can echo request content back.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ChatMessage, CompletionRequest, CompletionResponse, CompletionService, CompletionUsage};
use crate::error::{CompletionError, ConfigError};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Configuration for the OpenAI completion service
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,

    pub model: String,

    /// API root, without a trailing `/chat/completions`
    pub base_url: String,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid("OpenAI API key is empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("OpenAI model name is empty".to_string()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "OpenAI base URL must be http(s), got '{}'",
                self.base_url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("OpenAI timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: 30_000,
        }
    }
}

// Keep the key out of logs.
impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionReply {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ReplyMessage>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// `CompletionService` backed by the OpenAI chat completions API
pub struct OpenAiCompletionService {
    client: Client,
    config: OpenAiConfig,
    endpoint: String,
}

impl OpenAiCompletionService {
    pub fn new(config: OpenAiConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {}", e)))?;

        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            config,
            endpoint,
        })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletionService {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let body = ChatCompletionBody {
            model: &self.config.model,
            messages: &request.messages,
            temperature: request.temperature,
            response_format: request.json_output.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() { "timed out" } else { "request failed" };
                tracing::warn!(error = %e, endpoint = %self.endpoint, "Completion request {}", reason);
                CompletionError::Upstream(format!("completion request {}", reason))
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(
                status = status.as_u16(),
                body_len = detail.len(),
                "Completion service returned an error status"
            );
            tracing::debug!(body = %detail, "Completion service error body");
            return Err(CompletionError::Upstream(format!(
                "completion service returned status {}",
                status.as_u16()
            )));
        }

        let reply: ChatCompletionReply = response.json().await.map_err(|e| {
            tracing::warn!(error = %e, "Completion service reply was not a chat completion");
            CompletionError::Upstream("completion service reply could not be decoded".to_string())
        })?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content);

        Ok(CompletionResponse {
            content,
            model: reply.model,
            usage: reply.usage.map(|usage| CompletionUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            }),
        })
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::ChatRole;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![
                ChatMessage {
                    role: ChatRole::System,
                    content: "sys".to_string(),
                },
                ChatMessage {
                    role: ChatRole::User,
                    content: "usr".to_string(),
                },
            ],
            temperature: 0.35,
            json_output: true,
        }
    }

    fn service(server: &MockServer) -> OpenAiCompletionService {
        OpenAiCompletionService::new(
            OpenAiConfig::new("sk-test", "gpt-4o-mini").with_base_url(server.uri()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_complete_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "response_format": {"type": "json_object"},
                "messages": [{"role": "system", "content": "sys"}, {"role": "user", "content": "usr"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "gpt-4o-mini-2024-07-18",
                "choices": [{"message": {"role": "assistant", "content": "{\"verdict\":\"other\"}"}}],
                "usage": {"prompt_tokens": 31, "completion_tokens": 9, "total_tokens": 40}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = service(&server).complete(request()).await.unwrap();
        assert_eq!(response.content.as_deref(), Some("{\"verdict\":\"other\"}"));
        assert_eq!(response.model.as_deref(), Some("gpt-4o-mini-2024-07-18"));
        assert_eq!(
            response.usage,
            Some(CompletionUsage {
                prompt_tokens: 31,
                completion_tokens: 9
            })
        );
    }

    #[tokio::test]
    async fn test_complete_without_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let response = service(&server).complete(request()).await.unwrap();
        assert!(response.content.is_none());
        assert!(response.model.is_none());
        assert!(response.usage.is_none());
    }

    #[tokio::test]
    async fn test_error_status_does_not_echo_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(500).set_body_string("secret narrative text leaked"),
            )
            .mount(&server)
            .await;

        let err = service(&server).complete(request()).await.unwrap_err();
        assert!(matches!(err, CompletionError::Upstream(_)));
        assert!(!err.to_string().contains("secret"));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_timeout_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"choices": []}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let service = OpenAiCompletionService::new(
            OpenAiConfig::new("sk-test", "gpt-4o-mini")
                .with_base_url(server.uri())
                .with_timeout_ms(50),
        )
        .unwrap();

        let err = service.complete(request()).await.unwrap_err();
        assert!(matches!(err, CompletionError::Upstream(_)));
    }

    #[test]
    fn test_config_validation() {
        assert!(OpenAiConfig::new("", "gpt-4o-mini").validate().is_err());
        assert!(OpenAiConfig::new("sk", "").validate().is_err());
        assert!(OpenAiConfig::new("sk", "m").with_base_url("ftp://x").validate().is_err());
        assert!(OpenAiConfig::new("sk", "m").with_timeout_ms(0).validate().is_err());
        assert!(OpenAiConfig::new("sk", "m").validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = OpenAiConfig::new("sk-very-secret", "gpt-4o-mini");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-very-secret"));
    }
}
