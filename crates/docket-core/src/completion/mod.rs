//! Completion service boundary and the typed ruling/bias client
//!
//! `CompletionService` is the seam to the external model: one request in, raw
//! text out. `CompletionClient` layers the prompts, sampling temperatures and
//! response validation on top of it.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::error::CompletionError;
use crate::metrics::{CompletionCall, DocketMetrics};
use crate::model::{BiasFields, Case, RulingFields, Verdict};
use crate::prompts::{build_bias_prompt, build_ruling_prompt, Prompt};
use crate::response::{parse_bias_response, parse_ruling_response};

/// Sampling temperature for ruling generation
pub const RULING_TEMPERATURE: f32 = 0.35;

/// Sampling temperature for the bias audit
pub const BIAS_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// A single completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    /// Ask the service to constrain output to a JSON object
    pub json_output: bool,
}

impl CompletionRequest {
    /// System + user messages from a prompt, JSON output requested
    pub fn from_prompt(prompt: Prompt, temperature: f32) -> Self {
        Self {
            messages: vec![
                ChatMessage {
                    role: ChatRole::System,
                    content: prompt.system,
                },
                ChatMessage {
                    role: ChatRole::User,
                    content: prompt.user,
                },
            ],
            temperature,
            json_output: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// What the service returned. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResponse {
    pub content: Option<String>,
    pub model: Option<String>,
    pub usage: Option<CompletionUsage>,
}

/// An external text-completion backend
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: CompletionRequest)
        -> Result<CompletionResponse, CompletionError>;

    /// Configured model name, used when a response omits one
    fn model(&self) -> &str;
}

/// A validated ruling and the bookkeeping of the call that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct RulingResult {
    pub verdict: Verdict,
    pub rationale: String,
    pub citations: Vec<String>,
    pub risk_flags: Vec<String>,
    /// Parsed model output, as returned
    pub raw: serde_json::Value,
    pub model_name: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

impl RulingResult {
    pub fn fields(&self) -> RulingFields {
        RulingFields {
            verdict: self.verdict,
            rationale: self.rationale.clone(),
            citations: self.citations.clone(),
            risk_flags: self.risk_flags.clone(),
            model_name: self.model_name.clone(),
            tokens_in: self.tokens_in,
            tokens_out: self.tokens_out,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BiasResult {
    pub bias_score: f64,
    pub notes: Vec<String>,
}

impl BiasResult {
    pub fn fields(&self) -> BiasFields {
        BiasFields {
            bias_score: self.bias_score,
            notes: self.notes.clone(),
        }
    }
}

/// Typed ruling and bias calls over a `CompletionService`
#[derive(Clone)]
pub struct CompletionClient {
    service: Arc<dyn CompletionService>,
    metrics: Option<Arc<DocketMetrics>>,
}

impl CompletionClient {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self {
            service,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<DocketMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn model(&self) -> &str {
        self.service.model()
    }

    /// Ask the model for a ruling on `case`
    pub async fn generate_ruling(
        &self,
        case: &Case,
        extra: &[(String, String)],
    ) -> Result<RulingResult, CompletionError> {
        let prompt = build_ruling_prompt(&case.title, &case.narrative, &case.locale, extra);
        let request = CompletionRequest::from_prompt(prompt, RULING_TEMPERATURE);

        let response = self.call(CompletionCall::Ruling, request).await?;
        let content = self.content(CompletionCall::Ruling, &response)?;
        let payload = parse_ruling_response(content)
            .map_err(|e| self.record_failure(CompletionCall::Ruling, e))?;

        let usage = response.usage.unwrap_or_default();
        Ok(RulingResult {
            verdict: payload.verdict,
            rationale: payload.rationale,
            citations: payload.citations,
            risk_flags: payload.risk_flags,
            raw: payload.raw,
            model_name: response
                .model
                .clone()
                .unwrap_or_else(|| self.service.model().to_string()),
            tokens_in: usage.prompt_tokens,
            tokens_out: usage.completion_tokens,
        })
    }

    /// Ask the model to audit a ruling, given its JSON serialization
    pub async fn run_bias_check(&self, ruling_json: &str) -> Result<BiasResult, CompletionError> {
        let request =
            CompletionRequest::from_prompt(build_bias_prompt(ruling_json), BIAS_TEMPERATURE);

        let response = self.call(CompletionCall::Bias, request).await?;
        let content = self.content(CompletionCall::Bias, &response)?;
        let payload = parse_bias_response(content)
            .map_err(|e| self.record_failure(CompletionCall::Bias, e))?;

        Ok(BiasResult {
            bias_score: payload.bias_score,
            notes: payload.notes,
        })
    }

    async fn call(
        &self,
        call: CompletionCall,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let start = Instant::now();
        let result = self.service.complete(request).await;
        let elapsed = start.elapsed();

        if let Some(metrics) = &self.metrics {
            metrics.observe_completion(call, elapsed.as_secs_f64());
        }
        tracing::debug!(
            call = call.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            ok = result.is_ok(),
            "Completion call finished"
        );

        result.map_err(|e| self.record_failure(call, e))
    }

    fn content<'a>(
        &self,
        call: CompletionCall,
        response: &'a CompletionResponse,
    ) -> Result<&'a str, CompletionError> {
        match response.content.as_deref() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(self.record_failure(
                call,
                CompletionError::Upstream("empty completion from language model".to_string()),
            )),
        }
    }

    fn record_failure(&self, call: CompletionCall, err: CompletionError) -> CompletionError {
        tracing::warn!(call = call.as_str(), kind = err.kind(), error = %err, "Completion call failed");
        if let Some(metrics) = &self.metrics {
            metrics.record_completion_failure(call, err.kind());
        }
        err
    }
}
