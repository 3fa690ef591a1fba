//! Rate-limited LLM request gateway
mod client;
mod config;
mod limiter;
mod message;
mod provider;
pub mod gate;
pub mod replay;
pub mod validate;

use thiserror::Error;

/// Result type for client-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types raised while talking to the upstream provider.
///
/// These never leave [`CompletionProvider`]; callers only ever see a [`Failure`].
#[derive(Debug, Error)]
pub enum Error {
    /// Upstream rejected the call or answered with something unusable; the
    /// message already says so
    #[error("{0}")]
    Api(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A client-caused input problem. The message names the offending field and
/// the constraint it broke.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Outcome of a request that did not produce a completion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure {
    /// Bad client input, detected before any provider call
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No provider credential was present at startup
    #[error("OpenAI API key not configured")]
    NotConfigured,

    /// The provider call itself failed; carries the provider's message
    #[error("Error generating completion: {0}")]
    Provider(String),
}

pub use client::{create_client, Client, Completion, OpenAIClient};
pub use config::{ProviderConfig, DEFAULT_API_BASE, PLACEHOLDER_API_KEY};
pub use limiter::{SlidingWindowLimiter, DEFAULT_LIMIT, DEFAULT_WINDOW};
pub use message::{Message, MessageRole, Usage};
pub use provider::{CompletionProvider, CompletionRequest, CompletionResult, Sampling};
