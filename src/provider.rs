//! Completion provider: the single boundary to the upstream LLM
//!
//! Whether a provider is configured is decided once, when the
//! [`CompletionProvider`] is built. An unconfigured provider answers every call
//! with [`Failure::NotConfigured`] without touching the network, and every
//! upstream error is folded into [`Failure::Provider`] here and nowhere else.

use super::{
    client::{create_client, Client, Completion},
    config::ProviderConfig,
    message::Message,
    Failure, Result,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

/// Sampling parameters forwarded to the provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    /// Sampling temperature, `0.0..=2.0`
    pub temperature: f64,

    /// Maximum output tokens, `1..=4000`
    pub max_tokens: u32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 150,
        }
    }
}

/// One request for a completion. Built by a handler after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    prompt: String,
    model: String,
    sampling: Sampling,
    history: Vec<Message>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            sampling: Sampling::default(),
            history: Vec::new(),
        }
    }

    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.sampling.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.sampling.max_tokens = max_tokens;
        self
    }

    /// Prior conversation turns, oldest first
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// History followed by the new user message
    pub fn messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.extend(self.history.iter().cloned());
        messages.push(Message::user(self.prompt.clone()));
        messages
    }
}

/// Normalized completion returned to handlers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionResult {
    /// Generated text
    pub response: String,

    /// Model the request was made with
    pub model: String,

    /// Total tokens, when the provider reports usage
    pub tokens_used: Option<u32>,

    /// Why generation stopped
    #[serde(skip)]
    pub finish_reason: Option<String>,
}

impl CompletionResult {
    fn from_completion(completion: Completion, model: &str) -> Self {
        Self {
            response: completion.content,
            model: model.to_string(),
            tokens_used: completion.usage.map(|u| u.total_tokens),
            finish_reason: completion.finish_reason,
        }
    }
}

/// Wraps the configured [`Client`], if any.
#[derive(Clone)]
pub struct CompletionProvider {
    client: Option<Arc<dyn Client>>,
}

impl CompletionProvider {
    /// Build from an optional provider configuration.
    ///
    /// `None` yields an unconfigured provider; it is not an error.
    pub fn from_config(config: Option<ProviderConfig>) -> Result<Self> {
        match config {
            Some(config) => Ok(Self::with_client(Arc::from(create_client(config)?))),
            None => Ok(Self::unconfigured()),
        }
    }

    /// Provider backed by an explicit client
    pub fn with_client(client: Arc<dyn Client>) -> Self {
        Self { client: Some(client) }
    }

    /// Provider that fails every call with [`Failure::NotConfigured`]
    pub fn unconfigured() -> Self {
        Self { client: None }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Upstream API base, when configured
    pub fn api_base(&self) -> Option<&str> {
        self.client.as_deref().map(|c| c.api_base())
    }

    /// Chat completion over the request's history plus its prompt
    pub async fn chat(&self, request: &CompletionRequest) -> std::result::Result<CompletionResult, Failure> {
        let client = self.client.as_ref().ok_or(Failure::NotConfigured)?;
        let messages = request.messages();
        debug!(
            "Chat completion: model={} messages={} max_tokens={}",
            request.model, messages.len(), request.sampling.max_tokens
        );

        client
            .chat(&messages, &request.model, request.sampling)
            .await
            .map(|completion| CompletionResult::from_completion(completion, &request.model))
            .map_err(|e| {
                error!("Chat completion failed: {}", e);
                Failure::Provider(e.to_string())
            })
    }

    /// Legacy single-prompt completion. History is ignored.
    pub async fn complete(&self, request: &CompletionRequest) -> std::result::Result<CompletionResult, Failure> {
        let client = self.client.as_ref().ok_or(Failure::NotConfigured)?;
        debug!(
            "Text completion: model={} max_tokens={}",
            request.model, request.sampling.max_tokens
        );

        client
            .complete(&request.prompt, &request.model, request.sampling)
            .await
            .map(|completion| CompletionResult::from_completion(completion, &request.model))
            .map_err(|e| {
                error!("Text completion failed: {}", e);
                Failure::Provider(e.to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, MessageRole, Usage};
    use std::sync::Mutex;

    /// Records what it was asked and answers with a canned completion or error
    #[derive(Default)]
    struct RecordingClient {
        calls: Mutex<Vec<(String, Vec<Message>, String, Sampling)>>,
        fail_with: Option<String>,
    }

    impl RecordingClient {
        fn answer(&self, kind: &str, messages: Vec<Message>, model: &str, sampling: Sampling) -> Result<Completion> {
            self.calls
                .lock()
                .unwrap()
                .push((kind.to_string(), messages, model.to_string(), sampling));
            match &self.fail_with {
                Some(msg) => Err(Error::Api(msg.clone())),
                None => Ok(Completion {
                    content: "four word summary here".to_string(),
                    usage: Some(Usage {
                        prompt_tokens: 5,
                        completion_tokens: 4,
                        total_tokens: 9,
                    }),
                    finish_reason: Some("stop".to_string()),
                }),
            }
        }
    }

    #[async_trait::async_trait]
    impl Client for RecordingClient {
        async fn chat(&self, messages: &[Message], model: &str, sampling: Sampling) -> Result<Completion> {
            self.answer("chat", messages.to_vec(), model, sampling)
        }

        async fn complete(&self, prompt: &str, model: &str, sampling: Sampling) -> Result<Completion> {
            self.answer("complete", vec![Message::user(prompt)], model, sampling)
        }

        fn api_base(&self) -> &str {
            "stub://"
        }
    }

    #[test]
    fn test_messages_put_history_before_prompt() {
        let request = CompletionRequest::new("and now?", "gpt-4").with_history(vec![
            Message::system("Be terse"),
            Message::user("hi"),
            Message::assistant("hello"),
        ]);
        let messages = request.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[3], Message::user("and now?"));
    }

    #[tokio::test]
    async fn test_unconfigured_provider_fails_without_calling() {
        let provider = CompletionProvider::unconfigured();
        assert!(!provider.is_configured());

        let request = CompletionRequest::new("hi", "gpt-4");
        assert_eq!(provider.chat(&request).await, Err(Failure::NotConfigured));
        assert_eq!(provider.complete(&request).await, Err(Failure::NotConfigured));
    }

    #[test]
    fn test_from_config_none_is_unconfigured() {
        let provider = CompletionProvider::from_config(None).unwrap();
        assert!(!provider.is_configured());
        assert!(provider.api_base().is_none());
    }

    #[tokio::test]
    async fn test_chat_result_carries_requested_model_and_usage() {
        let client = Arc::new(RecordingClient::default());
        let provider = CompletionProvider::with_client(client.clone());

        let request = CompletionRequest::new("hi", "gpt-4").with_temperature(0.0).with_max_tokens(20);
        let result = provider.chat(&request).await.unwrap();

        assert_eq!(result.model, "gpt-4");
        assert_eq!(result.tokens_used, Some(9));
        assert_eq!(result.finish_reason.as_deref(), Some("stop"));

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "chat");
        assert_eq!(calls[0].3, Sampling { temperature: 0.0, max_tokens: 20 });
    }

    #[tokio::test]
    async fn test_complete_uses_legacy_capability() {
        let client = Arc::new(RecordingClient::default());
        let provider = CompletionProvider::with_client(client.clone());

        let request = CompletionRequest::new("Once", "gpt-3.5-turbo-instruct")
            .with_history(vec![Message::user("ignored")]);
        provider.complete(&request).await.unwrap();

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls[0].0, "complete");
        assert_eq!(calls[0].1, vec![Message::user("Once")]);
    }

    #[tokio::test]
    async fn test_client_errors_are_normalized() {
        let client = Arc::new(RecordingClient {
            fail_with: Some("quota exceeded".to_string()),
            ..Default::default()
        });
        let provider = CompletionProvider::with_client(client);

        let err = provider.chat(&CompletionRequest::new("hi", "gpt-4")).await.unwrap_err();
        match err {
            Failure::Provider(msg) => assert!(msg.contains("quota exceeded")),
            other => panic!("expected provider failure, got {:?}", other),
        }
    }
}
