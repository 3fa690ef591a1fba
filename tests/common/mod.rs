//! Shared helpers for gateway integration tests
#![allow(dead_code)]

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use prompt_gate::gate::{build_router, Containment, GatewayState};
use prompt_gate::{Client, Completion, CompletionProvider, Message, Result, Sampling, SlidingWindowLimiter, Usage};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

/// What the stub should do when called
#[derive(Clone)]
pub enum Reply {
    Text(String),
    Fail(String),
    Panic,
}

/// In-process stand-in for the upstream provider
pub struct StubClient {
    reply: Reply,
    calls: AtomicUsize,
    last_messages: Mutex<Vec<Message>>,
    last_sampling: Mutex<Option<Sampling>>,
}

impl StubClient {
    pub fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
            last_sampling: Mutex::new(None),
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        Self::new(Reply::Text(text.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<Message> {
        self.last_messages.lock().unwrap().clone()
    }

    pub fn last_sampling(&self) -> Option<Sampling> {
        *self.last_sampling.lock().unwrap()
    }

    fn answer(&self, messages: Vec<Message>, sampling: Sampling) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().unwrap() = messages;
        *self.last_sampling.lock().unwrap() = Some(sampling);
        match &self.reply {
            Reply::Text(text) => Ok(Completion {
                content: text.clone(),
                usage: Some(Usage {
                    prompt_tokens: 12,
                    completion_tokens: 8,
                    total_tokens: 20,
                }),
                finish_reason: Some("stop".to_string()),
            }),
            Reply::Fail(msg) => Err(prompt_gate::Error::Api(msg.clone())),
            Reply::Panic => panic!("stub provider blew up"),
        }
    }
}

#[async_trait::async_trait]
impl Client for StubClient {
    async fn chat(&self, messages: &[Message], _model: &str, sampling: Sampling) -> Result<Completion> {
        self.answer(messages.to_vec(), sampling)
    }

    async fn complete(&self, prompt: &str, _model: &str, sampling: Sampling) -> Result<Completion> {
        self.answer(vec![Message::user(prompt)], sampling)
    }

    fn api_base(&self) -> &str {
        "stub://provider"
    }
}

/// Builder for a router under test
pub struct TestApp {
    pub provider: CompletionProvider,
    pub limiter: SlidingWindowLimiter,
    pub debug: bool,
}

impl TestApp {
    pub fn unconfigured() -> Self {
        Self::with_provider(CompletionProvider::unconfigured())
    }

    pub fn with_stub(stub: Arc<StubClient>) -> Self {
        Self::with_provider(CompletionProvider::with_client(stub))
    }

    pub fn with_provider(provider: CompletionProvider) -> Self {
        Self {
            provider,
            limiter: SlidingWindowLimiter::default(),
            debug: false,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limiter = SlidingWindowLimiter::new(limit, Duration::from_secs(60));
        self
    }

    pub fn debug(mut self) -> Self {
        self.debug = true;
        self
    }

    pub fn router(&self) -> Router {
        let state = GatewayState::new(self.provider.clone()).with_stream_delay(Duration::ZERO);
        build_router(state, self.limiter.clone(), Containment { debug: self.debug })
    }
}

const DEFAULT_PEER: [u8; 4] = [192, 0, 2, 10];

pub fn get(uri: &str) -> Request<Body> {
    get_from(uri, DEFAULT_PEER)
}

pub fn get_from(uri: &str, ip: [u8; 4]) -> Request<Body> {
    let mut req = Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap();
    req.extensions_mut().insert(ConnectInfo(SocketAddr::from((ip, 51000))));
    req
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    post_json_from(uri, body, DEFAULT_PEER)
}

pub fn post_json_from(uri: &str, body: serde_json::Value, ip: [u8; 4]) -> Request<Body> {
    let mut req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    req.extensions_mut().insert(ConnectInfo(SocketAddr::from((ip, 51000))));
    req
}

/// Send one request and return status plus parsed JSON body
pub async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

/// OpenAI mock server for end-to-end tests
pub struct OpenAIMockServer {
    server: MockServer,
}

impl OpenAIMockServer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    /// Mount a non-streaming chat completion response
    pub async fn mock_chat_completion(&self, content: &str, total_tokens: u32) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-mock",
                "object": "chat.completion",
                "created": 1234567890,
                "model": "gpt-3.5-turbo",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": content},
                    "finish_reason": "stop"
                }],
                "usage": {
                    "prompt_tokens": 10,
                    "completion_tokens": total_tokens - 10,
                    "total_tokens": total_tokens
                }
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a legacy text completion response
    pub async fn mock_text_completion(&self, text: &str) {
        Mock::given(method("POST"))
            .and(path("/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cmpl-mock",
                "object": "text_completion",
                "model": "gpt-3.5-turbo-instruct",
                "choices": [{"index": 0, "text": text, "finish_reason": "length"}]
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount an upstream error for chat completions
    pub async fn mock_chat_error(&self, status: u16, message: &str) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
                "error": {"message": message, "type": "invalid_request_error"}
            })))
            .mount(&self.server)
            .await;
    }
}
