//! LLM client implementations

use super::{config::ProviderConfig, message::Message, provider::Sampling, Error, Result, Usage};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Build an HTTP client with specified timeout
fn build_http_client(timeout: Duration) -> std::result::Result<HttpClient, reqwest::Error> {
    HttpClient::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
}

/// Raw completion returned by a provider, before it is tagged with the model
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Generated text
    pub content: String,

    /// Token usage, when the provider reports it
    pub usage: Option<Usage>,

    /// Why generation stopped (`stop`, `length`, ...)
    pub finish_reason: Option<String>,
}

/// Trait for LLM clients
#[async_trait::async_trait]
pub trait Client: Send + Sync {
    /// Send a chat completion request
    async fn chat(&self, messages: &[Message], model: &str, sampling: Sampling) -> Result<Completion>;

    /// Send a legacy single-prompt completion request
    async fn complete(&self, prompt: &str, model: &str, sampling: Sampling) -> Result<Completion>;

    /// Get the API base URL
    fn api_base(&self) -> &str;
}

/// Create an LLM client for the provider configuration.
///
/// Returns a trait object so callers are decoupled from the concrete
/// provider type.
pub fn create_client(config: ProviderConfig) -> Result<Box<dyn Client>> {
    Ok(Box::new(OpenAIClient::new(config)?))
}

/// OpenAI client implementation
pub struct OpenAIClient {
    config: ProviderConfig,
    http_client: HttpClient,
}

impl OpenAIClient {
    /// Create a new OpenAI client
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let timeout = config.timeout();
        Ok(OpenAIClient {
            http_client: build_http_client(timeout)?,
            config,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    /// POST a JSON body and return the response text, mapping non-2xx to `Error::Api`
    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<String> {
        let response = self
            .http_client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Error::Api(format!(
                "OpenAI API error ({}): {}",
                status,
                api_error_message(&body)
            )));
        }

        Ok(body)
    }
}

#[async_trait::async_trait]
impl Client for OpenAIClient {
    async fn chat(&self, messages: &[Message], model: &str, sampling: Sampling) -> Result<Completion> {
        let url = self.endpoint("chat/completions");
        let request = ChatRequest {
            model,
            messages,
            temperature: sampling.temperature,
            max_tokens: sampling.max_tokens,
        };

        let body = self.post(&url, &request).await?;
        let response: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Api(format!("Failed to parse OpenAI response: {}. Body: {}", e, body)))?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Api("No choices in OpenAI response".to_string()))?;

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            usage: response.usage,
            finish_reason: choice.finish_reason,
        })
    }

    async fn complete(&self, prompt: &str, model: &str, sampling: Sampling) -> Result<Completion> {
        let url = self.endpoint("completions");
        let request = TextRequest {
            model,
            prompt,
            temperature: sampling.temperature,
            max_tokens: sampling.max_tokens,
        };

        let body = self.post(&url, &request).await?;
        let response: TextResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Api(format!("Failed to parse OpenAI response: {}. Body: {}", e, body)))?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Api("No choices in OpenAI response".to_string()))?;

        Ok(Completion {
            content: choice.text.trim().to_string(),
            usage: response.usage,
            finish_reason: choice.finish_reason,
        })
    }

    fn api_base(&self) -> &str {
        &self.config.api_base
    }
}

/// Pull `error.message` out of an OpenAI error body, falling back to the raw body
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

// OpenAI types

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct TextRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct TextResponse {
    choices: Vec<TextChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct TextChoice {
    text: String,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}
