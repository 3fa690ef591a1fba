//! Request middleware
//!
//! Order, outermost first:
//! 1. [`log_requests`]
//! 2. panic containment (`CatchPanicLayer` with [`panic_response`])
//! 3. [`contain_errors`]
//! 4. [`rate_limit`]
//!
//! Containment sits outside the limiter, so a fault in the limiter's own
//! bookkeeping still yields a 500 instead of tearing down the connection. The
//! limiter's 429 is an ordinary response and passes containment untouched.

use super::error::{internal_error, UnexpectedFailure};
use crate::SlidingWindowLimiter;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::any::Any;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{error, info, warn};

/// Paths never subject to rate limiting
pub const EXEMPT_PATHS: &[&str] = &["/", "/health", "/docs", "/redoc", "/openapi.json", "/advanced/models"];

/// Identity used when the peer address is unknown
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Whether `path` bypasses the rate limiter
pub fn is_exempt(path: &str) -> bool {
    EXEMPT_PATHS.contains(&path)
}

/// Rate-limit identity for a request: the peer IP, when the server exposes it
pub fn client_identity(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Logging middleware
pub async fn log_requests(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();

    let response = next.run(req).await;

    let duration = start.elapsed();
    let status = response.status();

    info!("{} {} {} {:?}", method, uri, status, duration);

    response
}

/// Error-containment settings
#[derive(Debug, Clone, Copy, Default)]
pub struct Containment {
    /// Expose failure detail in 500 bodies
    pub debug: bool,
}

/// Rewrite unexpected failures from inner layers into the generic 500 body.
///
/// Every other response, including 400s and the limiter's 429, is returned
/// unchanged.
pub async fn contain_errors(State(containment): State<Containment>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    match response.extensions().get::<UnexpectedFailure>() {
        Some(UnexpectedFailure(detail)) => {
            error!("Unexpected failure: {}", detail);
            internal_error(containment.debug.then(|| detail.clone()))
        }
        None => response,
    }
}

/// Convert a panic anywhere below containment into the generic 500 body
pub fn panic_response(err: Box<dyn Any + Send + 'static>, debug: bool) -> Response {
    let message = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic type");

    error!(message = %message, "service panic");

    internal_error(debug.then(|| message.to_string()))
}

/// Reject clients that have used up their window; exempt paths skip the check
pub async fn rate_limit(State(limiter): State<SlidingWindowLimiter>, req: Request, next: Next) -> Response {
    if is_exempt(req.uri().path()) {
        return next.run(req).await;
    }

    let identity = client_identity(&req);
    if !limiter.admit(&identity) {
        warn!("Rate limit exceeded for {} on {}", identity, req.uri().path());
        return rate_limited(&limiter);
    }

    next.run(req).await
}

/// 429 with a `Retry-After` equal to the window length
fn rate_limited(limiter: &SlidingWindowLimiter) -> Response {
    let retry_after = limiter.window().as_secs();
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": "Rate limit exceeded",
            "message": format!("Maximum {} requests per minute allowed", limiter.limit()),
            "retry_after": retry_after,
        })),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}
