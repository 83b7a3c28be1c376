//! Language model abstraction and the OpenAI-compatible HTTP backend.
//!
//! The [`LanguageModel`] trait decouples the stage agents from the actual
//! endpoint. Tests use scripted models that return predetermined replies
//! without touching the network.

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::config::ModelSettings;
use super::model_types::{
    ApiErrorBody, AssistantTurn, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
    ToolChoice, ToolDefinition,
};

/// Errors from model calls.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ModelError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// A structured-output call constrained to one named contract.
#[derive(Debug, Clone)]
pub struct StructuredRequest<'a> {
    /// Contract name; sent as the function the model must call.
    pub contract: &'a str,
    pub description: &'a str,
    /// JSON Schema of the contract.
    pub schema: &'a Value,
    pub messages: &'a [ChatMessage],
}

/// A free-form call where the model may request tools.
#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    pub messages: &'a [ChatMessage],
    pub tools: &'a [ToolDefinition],
}

/// Abstraction over model backends.
pub trait LanguageModel {
    /// Ask for an object conforming to `request.schema`.
    ///
    /// Returns the raw JSON text the model produced, or `None` when the model
    /// declined to produce the contract at all.
    fn structured(&self, request: &StructuredRequest<'_>) -> Result<Option<String>, ModelError>;

    /// One assistant turn of a tool-augmented conversation.
    fn chat(&self, request: &ChatRequest<'_>) -> Result<AssistantTurn, ModelError>;
}

/// Client for any endpoint speaking the OpenAI chat completions protocol
/// (OpenAI, Azure OpenAI, GitHub Models).
#[derive(Debug)]
pub struct OpenAiClient {
    http: Client,
    settings: ModelSettings,
}

impl OpenAiClient {
    pub fn new(settings: ModelSettings) -> Result<Self, ModelError> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self { http, settings })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    #[instrument(skip_all, fields(model = %self.settings.model, messages = messages.len(), tools = tools.len()))]
    fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        tool_choice: Option<ToolChoice>,
    ) -> Result<ChatMessage, ModelError> {
        let request = ChatCompletionRequest {
            model: &self.settings.model,
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            tools,
            tool_choice,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        let body = response.text()?;

        if !status.is_success() {
            let err = classify_error(status, &body, retry_after);
            warn!(status = status.as_u16(), error = %err, "model call failed");
            return Err(err);
        }
        parse_completion(&body)
    }
}

impl LanguageModel for OpenAiClient {
    fn structured(&self, request: &StructuredRequest<'_>) -> Result<Option<String>, ModelError> {
        let tools = [ToolDefinition::function(
            request.contract,
            request.description,
            request.schema.clone(),
        )];
        let message = self.complete(
            request.messages,
            &tools,
            Some(ToolChoice::function(request.contract)),
        )?;
        let arguments = message
            .tool_calls
            .into_iter()
            .find(|call| call.function.name == request.contract)
            .map(|call| call.function.arguments);
        debug!(
            contract = request.contract,
            produced = arguments.is_some(),
            "structured call finished"
        );
        Ok(arguments)
    }

    fn chat(&self, request: &ChatRequest<'_>) -> Result<AssistantTurn, ModelError> {
        let message = self.complete(request.messages, request.tools, None)?;
        Ok(AssistantTurn {
            content: message.content,
            tool_calls: message.tool_calls,
        })
    }
}

/// Parse a successful completion body into its first message.
pub fn parse_completion(body: &str) -> Result<ChatMessage, ModelError> {
    let resp: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| ModelError::InvalidResponse(format!("failed to parse response: {e}")))?;
    if let Some(usage) = &resp.usage {
        debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "model usage"
        );
    }
    resp.choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| ModelError::InvalidResponse("response has no choices".to_string()))
}

/// Map a failed HTTP response to a [`ModelError`].
///
/// Throttling is recognised by status 429 or by a rate-limit message in the
/// body, since some gateways report it under other statuses.
pub fn classify_error(status: StatusCode, body: &str, retry_after: Option<u64>) -> ModelError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    if status == StatusCode::TOO_MANY_REQUESTS || mentions_rate_limit(&message) {
        return ModelError::RateLimited { retry_after };
    }
    ModelError::Api {
        status: status.as_u16(),
        message,
    }
}

fn mentions_rate_limit(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("rate limit") || lower.contains("ratelimit")
}
