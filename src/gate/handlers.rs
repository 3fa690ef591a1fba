//! HTTP request handlers for the gateway

use super::error::ApiError;
use crate::validate::{validate_history, validate_max_tokens, validate_model, validate_prompt, validate_temperature};
use crate::{CompletionProvider, CompletionRequest, CompletionResult, Sampling, ValidationError};
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::info;

/// Default model for chat-style endpoints
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// Default model for the legacy text endpoint
pub const DEFAULT_TEXT_MODEL: &str = "gpt-3.5-turbo-instruct";

/// Gateway state shared across handlers
#[derive(Clone)]
pub struct GatewayState {
    pub provider: CompletionProvider,

    /// Pause between replayed stream frames
    pub stream_delay: Duration,
}

impl GatewayState {
    pub fn new(provider: CompletionProvider) -> Self {
        Self {
            provider,
            stream_delay: crate::replay::DEFAULT_FRAME_DELAY,
        }
    }

    pub fn with_stream_delay(mut self, stream_delay: Duration) -> Self {
        self.stream_delay = stream_delay;
        self
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub message: String,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub prompt: String,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ConversationBody {
    pub message: String,
    pub conversation_history: Option<Vec<Value>>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<f64>,
}

/// Validate model, temperature and token budget, in that order, falling back
/// to defaults for absent fields
pub(crate) fn validated_params(
    model: Option<&str>,
    default_model: &str,
    temperature: Option<f64>,
    max_tokens: Option<f64>,
    default_max_tokens: u32,
) -> Result<(String, Sampling), ValidationError> {
    let defaults = Sampling::default();
    let model = validate_model(model.unwrap_or(default_model))?.to_string();
    let temperature = validate_temperature(temperature.unwrap_or(defaults.temperature))?;
    let max_tokens = validate_max_tokens(max_tokens.unwrap_or(f64::from(default_max_tokens)))?;
    Ok((model, Sampling { temperature, max_tokens }))
}

/// Root endpoint
pub async fn root() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "success",
        message: "prompt-gate is running!",
    })
}

/// Health check endpoint
pub async fn health() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "healthy",
        message: "API is operational",
    })
}

/// Single-turn chat completion
pub async fn chat(
    State(state): State<GatewayState>,
    payload: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<CompletionResult>, ApiError> {
    let Json(body) = payload?;
    let (model, sampling) = validated_params(
        body.model.as_deref(),
        DEFAULT_CHAT_MODEL,
        body.temperature,
        body.max_tokens,
        Sampling::default().max_tokens,
    )?;
    let message = validate_prompt("message", &body.message)?;

    info!("Chat request for model: {}", model);

    let request = CompletionRequest::new(message, model).with_sampling(sampling);
    Ok(Json(state.provider.chat(&request).await?))
}

/// Legacy single-prompt text completion
pub async fn text(
    State(state): State<GatewayState>,
    payload: Result<Json<TextBody>, JsonRejection>,
) -> Result<Json<CompletionResult>, ApiError> {
    let Json(body) = payload?;
    let (model, sampling) = validated_params(
        body.model.as_deref(),
        DEFAULT_TEXT_MODEL,
        body.temperature,
        body.max_tokens,
        Sampling::default().max_tokens,
    )?;
    let prompt = validate_prompt("prompt", &body.prompt)?;

    info!("Text completion request for model: {}", model);

    let request = CompletionRequest::new(prompt, model).with_sampling(sampling);
    Ok(Json(state.provider.complete(&request).await?))
}

/// Chat completion continuing a prior conversation
pub async fn conversation(
    State(state): State<GatewayState>,
    payload: Result<Json<ConversationBody>, JsonRejection>,
) -> Result<Json<CompletionResult>, ApiError> {
    let Json(body) = payload?;
    let (model, sampling) = validated_params(
        body.model.as_deref(),
        DEFAULT_CHAT_MODEL,
        body.temperature,
        body.max_tokens,
        Sampling::default().max_tokens,
    )?;
    let message = validate_prompt("message", &body.message)?;
    let history = validate_history(body.conversation_history.as_deref().unwrap_or_default())?;

    info!(
        "Conversation request for model: {} ({} prior turns)",
        model,
        history.len()
    );

    let request = CompletionRequest::new(message, model)
        .with_sampling(sampling)
        .with_history(history);
    Ok(Json(state.provider.chat(&request).await?))
}
