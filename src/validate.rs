//! Request parameter validation
//!
//! Every check is a pure function returning the accepted value or a
//! [`ValidationError`] naming the field and the constraint it broke. Handlers
//! run these before any provider call is attempted.

use crate::{Message, MessageRole, ValidationError};
use serde_json::Value;

/// Chat-capable models
pub const CHAT_MODELS: &[&str] = &["gpt-3.5-turbo", "gpt-3.5-turbo-16k", "gpt-4", "gpt-4-1106-preview"];

/// Legacy completion models
pub const TEXT_MODELS: &[&str] = &["gpt-3.5-turbo-instruct"];

/// Every model a request may name
pub const ALLOWED_MODELS: &[&str] = &[
    "gpt-3.5-turbo",
    "gpt-3.5-turbo-16k",
    "gpt-3.5-turbo-instruct",
    "gpt-4",
    "gpt-4-1106-preview",
];

pub const MIN_TEMPERATURE: f64 = 0.0;
pub const MAX_TEMPERATURE: f64 = 2.0;
pub const MIN_MAX_TOKENS: u32 = 1;
pub const MAX_MAX_TOKENS: u32 = 4000;
pub const MAX_HISTORY_TURNS: usize = 20;
pub const MAX_PROMPT_CHARS: usize = 2000;

pub fn validate_model(model: &str) -> Result<&str, ValidationError> {
    if ALLOWED_MODELS.contains(&model) {
        Ok(model)
    } else {
        Err(ValidationError::new(format!(
            "Model '{}' not supported. Allowed models: {}",
            model,
            ALLOWED_MODELS.join(", ")
        )))
    }
}

/// Inclusive on both ends; NaN is rejected
pub fn validate_temperature(temperature: f64) -> Result<f64, ValidationError> {
    if (MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
        Ok(temperature)
    } else {
        Err(ValidationError::new(format!(
            "Temperature must be between {:.1} and {:.1}",
            MIN_TEMPERATURE, MAX_TEMPERATURE
        )))
    }
}

/// Takes the raw JSON number, so `100.0` is accepted and `100.5` is reported
/// against this field rather than as a parse error
pub fn validate_max_tokens(max_tokens: f64) -> Result<u32, ValidationError> {
    if max_tokens.fract() != 0.0 {
        return Err(ValidationError::new("max_tokens must be a whole number"));
    }
    if (f64::from(MIN_MAX_TOKENS)..=f64::from(MAX_MAX_TOKENS)).contains(&max_tokens) {
        // Whole and in range, so the cast is exact
        Ok(max_tokens as u32)
    } else {
        Err(ValidationError::new(format!(
            "max_tokens must be between {} and {}",
            MIN_MAX_TOKENS, MAX_MAX_TOKENS
        )))
    }
}

/// Prompt-like text fields must be non-empty and at most 2000 characters
pub fn validate_prompt<'a>(field: &str, text: &'a str) -> Result<&'a str, ValidationError> {
    let chars = text.chars().count();
    if chars == 0 {
        Err(ValidationError::new(format!("{} must not be empty", field)))
    } else if chars > MAX_PROMPT_CHARS {
        Err(ValidationError::new(format!(
            "{} must be at most {} characters",
            field, MAX_PROMPT_CHARS
        )))
    } else {
        Ok(text)
    }
}

/// Turn raw history entries into messages.
///
/// Each entry must be an object with string `role` and `content`, the role
/// must be `user`, `assistant` or `system`, and at most 20 entries are allowed.
pub fn validate_history(entries: &[Value]) -> Result<Vec<Message>, ValidationError> {
    if entries.len() > MAX_HISTORY_TURNS {
        return Err(ValidationError::new(format!(
            "conversation_history cannot exceed {} messages",
            MAX_HISTORY_TURNS
        )));
    }

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let role = entry.get("role").and_then(Value::as_str);
            let content = entry.get("content").and_then(Value::as_str);
            let (role, content) = match (role, content) {
                (Some(role), Some(content)) if !role.is_empty() && !content.is_empty() => (role, content),
                _ => {
                    return Err(ValidationError::new(format!(
                        "conversation_history[{}]: each message must have non-empty \"role\" and \"content\" fields",
                        i
                    )))
                }
            };
            let role: MessageRole = role.parse().map_err(|_| {
                ValidationError::new(format!(
                    "conversation_history[{}]: role must be \"user\", \"assistant\", or \"system\"",
                    i
                ))
            })?;
            Ok(Message::new(role, content))
        })
        .collect()
}
