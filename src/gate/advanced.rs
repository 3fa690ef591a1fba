//! `/advanced` endpoints: replayed streaming, summarization, translation and
//! the model catalogue

use super::error::ApiError;
use super::handlers::{validated_params, GatewayState, DEFAULT_CHAT_MODEL};
use crate::replay::{self, Frame};
use crate::validate::{validate_model, validate_prompt, CHAT_MODELS, TEXT_MODELS};
use crate::{CompletionRequest, Sampling, ValidationError};
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::{error, info};

const STREAM_DEFAULT_MAX_TOKENS: u32 = 200;
const SUMMARY_DEFAULT_MAX_TOKENS: u32 = 150;

/// Routes mounted under `/advanced`
pub fn router() -> Router<GatewayState> {
    Router::new()
        .route("/stream", post(stream))
        .route("/summarize", post(summarize))
        .route("/translate", post(translate))
        .route("/models", get(models))
}

#[derive(Debug, Deserialize)]
pub struct StreamBody {
    pub message: String,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct SummarizeBody {
    pub text: String,
    pub model: Option<String>,
    pub max_tokens: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SummarizeResponse {
    pub summary: String,
    pub original_length: usize,
    pub summary_length: usize,
    pub model: String,
    pub tokens_used: Option<u32>,
}

const DEFAULT_SOURCE_LANGUAGE: &str = "auto";
const DEFAULT_TARGET_LANGUAGE: &str = "English";

/// Absent and `null` languages both fall back to the defaults
#[derive(Debug, Deserialize)]
pub struct TranslateBody {
    pub text: String,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub model: String,
    pub tokens_used: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub chat_models: &'static [&'static str],
    pub text_models: &'static [&'static str],
    pub note: &'static str,
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn require_text(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        Err(ValidationError::new("text must not be empty"))
    } else {
        Ok(())
    }
}

fn summarize_prompt(text: &str) -> String {
    format!(
        "Please provide a concise summary of the following text:\n\n{}\n\nSummary:",
        text
    )
}

fn translate_prompt(text: &str, source_language: &str, target_language: &str) -> String {
    if source_language == DEFAULT_SOURCE_LANGUAGE {
        format!("Translate the following text to {}:\n\n{}", target_language, text)
    } else {
        format!(
            "Translate the following text from {} to {}:\n\n{}",
            source_language, target_language, text
        )
    }
}

/// Token budget for a translation: twice the source word count plus 50
pub fn translation_budget(text: &str) -> u32 {
    u32::try_from(word_count(text))
        .unwrap_or(u32::MAX)
        .saturating_mul(2)
        .saturating_add(50)
}

/// Chat completion replayed word by word as an event stream.
///
/// Validation failures are reported with a 400 before the stream starts. Once
/// the completion has been requested the status is always 200; a provider
/// failure becomes a single in-band error frame.
pub async fn stream(
    State(state): State<GatewayState>,
    payload: Result<Json<StreamBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload?;
    let (model, sampling) = validated_params(
        body.model.as_deref(),
        DEFAULT_CHAT_MODEL,
        body.temperature,
        body.max_tokens,
        STREAM_DEFAULT_MAX_TOKENS,
    )?;
    let message = validate_prompt("message", &body.message)?;

    info!("Stream request for model: {}", model);

    let request = CompletionRequest::new(message, model).with_sampling(sampling);
    let frames: BoxStream<'static, Frame> = match state.provider.chat(&request).await {
        Ok(result) => replay::replay(&result.response, state.stream_delay).boxed(),
        Err(failure) => replay::failed(failure.to_string()).boxed(),
    };

    let body = Body::from_stream(frames.map(|frame| Ok::<_, Infallible>(frame.to_event())));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(body)
        .map_err(|e| {
            error!("Failed to build stream response: {}", e);
            ApiError::Unexpected(e.to_string())
        })
}

/// Summarize `text`; lengths are whitespace-delimited word counts
pub async fn summarize(
    State(state): State<GatewayState>,
    payload: Result<Json<SummarizeBody>, JsonRejection>,
) -> Result<Json<SummarizeResponse>, ApiError> {
    let Json(body) = payload?;
    let (model, sampling) = validated_params(
        body.model.as_deref(),
        DEFAULT_CHAT_MODEL,
        None,
        body.max_tokens,
        SUMMARY_DEFAULT_MAX_TOKENS,
    )?;
    require_text(&body.text)?;

    info!("Summarize request for model: {} ({} words)", model, word_count(&body.text));

    let request = CompletionRequest::new(summarize_prompt(&body.text), model).with_sampling(sampling);
    let result = state.provider.chat(&request).await?;

    Ok(Json(SummarizeResponse {
        original_length: word_count(&body.text),
        summary_length: word_count(&result.response),
        summary: result.response,
        model: result.model,
        tokens_used: result.tokens_used,
    }))
}

/// Translate `text` into `target_language`
pub async fn translate(
    State(state): State<GatewayState>,
    payload: Result<Json<TranslateBody>, JsonRejection>,
) -> Result<Json<TranslateResponse>, ApiError> {
    let Json(body) = payload?;
    let model = validate_model(body.model.as_deref().unwrap_or(DEFAULT_CHAT_MODEL))?.to_string();
    require_text(&body.text)?;
    let source_language = body
        .source_language
        .unwrap_or_else(|| DEFAULT_SOURCE_LANGUAGE.to_string());
    let target_language = body
        .target_language
        .unwrap_or_else(|| DEFAULT_TARGET_LANGUAGE.to_string());

    info!(
        "Translate request for model: {} ({} -> {})",
        model, source_language, target_language
    );

    let sampling = Sampling {
        max_tokens: translation_budget(&body.text),
        ..Sampling::default()
    };
    let prompt = translate_prompt(&body.text, &source_language, &target_language);
    let request = CompletionRequest::new(prompt, model).with_sampling(sampling);
    let result = state.provider.chat(&request).await?;

    Ok(Json(TranslateResponse {
        translated_text: result.response,
        source_language,
        target_language,
        model: result.model,
        tokens_used: result.tokens_used,
    }))
}

/// Static model catalogue
pub async fn models() -> Json<ModelsResponse> {
    Json(ModelsResponse {
        chat_models: CHAT_MODELS,
        text_models: TEXT_MODELS,
        note: "Availability depends on your OpenAI API access level",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_budget() {
        assert_eq!(translation_budget(""), 50);
        assert_eq!(translation_budget("hola mundo"), 54);
        assert_eq!(translation_budget("  uno\tdos\ntres "), 56);
    }

    #[test]
    fn test_translate_prompt_variants() {
        assert_eq!(
            translate_prompt("hola", "auto", "English"),
            "Translate the following text to English:\n\nhola"
        );
        assert_eq!(
            translate_prompt("hola", "Spanish", "French"),
            "Translate the following text from Spanish to French:\n\nhola"
        );
    }

    #[test]
    fn test_summarize_prompt_wraps_text() {
        let prompt = summarize_prompt("a b c");
        assert!(prompt.starts_with("Please provide a concise summary"));
        assert!(prompt.ends_with("a b c\n\nSummary:"));
    }

    #[test]
    fn test_require_text() {
        assert!(require_text("   ").is_err());
        assert!(require_text("x").is_ok());
    }
}
