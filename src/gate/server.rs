//! Gateway HTTP server

use crate::gate::advanced;
use crate::gate::config::GatewayConfig;
use crate::gate::handlers::{self, GatewayState};
use crate::gate::middleware::{contain_errors, log_requests, panic_response, rate_limit, Containment};
use crate::{CompletionProvider, ProviderConfig, SlidingWindowLimiter};
use axum::{
    extract::Request,
    middleware,
    response::IntoResponse,
    routing::{get, post, Route},
    Router,
};
use std::any::Any;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tower::{Layer, Service};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer};
use tracing::{debug, info, warn};

/// Assemble the application: routes wrapped in the middleware chain.
///
/// The limiter is passed in rather than built here so callers (and tests)
/// own its lifetime and can share or inspect it.
pub fn build_router(state: GatewayState, limiter: SlidingWindowLimiter, containment: Containment) -> Router {
    let routes = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/chat", post(handlers::chat))
        .route("/text", post(handlers::text))
        .route("/conversation", post(handlers::conversation))
        .nest("/advanced", advanced::router())
        .with_state(state);

    with_middleware(
        routes,
        middleware::from_fn_with_state(limiter, rate_limit),
        containment,
    )
}

/// Wrap `routes` in the middleware chain with `admission` innermost.
///
/// Layers applied later wrap earlier ones, so from the outside in: CORS,
/// request logging, panic catching, error containment, admission.
fn with_middleware<L>(routes: Router, admission: L, containment: Containment) -> Router
where
    L: Layer<Route> + Clone + Send + 'static,
    L::Service: Service<Request> + Clone + Send + 'static,
    <L::Service as Service<Request>>::Response: IntoResponse + 'static,
    <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
    <L::Service as Service<Request>>::Future: Send + 'static,
{
    let debug = containment.debug;

    routes
        .layer(admission)
        .layer(middleware::from_fn_with_state(containment, contain_errors))
        .layer(CatchPanicLayer::custom(move |err: Box<dyn Any + Send + 'static>| {
            panic_response(err, debug)
        }))
        .layer(middleware::from_fn(log_requests))
        .layer(CorsLayer::permissive())
}

/// Periodically drop rate-limit identities with empty windows
pub fn spawn_eviction(limiter: SlidingWindowLimiter, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // first tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = limiter.evict_idle(Instant::now());
            if evicted > 0 {
                debug!("Evicted {} idle rate-limit identities ({} tracked)", evicted, limiter.tracked());
            }
        }
    })
}

/// Start the gateway server
pub async fn start_server(config: GatewayConfig) -> anyhow::Result<()> {
    let provider_config = ProviderConfig::from_env().map(|c| c.with_timeout_secs(config.timeout_secs));
    let provider = CompletionProvider::from_config(provider_config)?;
    match provider.api_base() {
        Some(api_base) => info!("Provider configured: {}", api_base),
        None => warn!("OPENAI_API_KEY not set; completion endpoints will report a configuration error"),
    }

    let limiter = SlidingWindowLimiter::new(config.requests_per_minute, config.window());
    if let Some(every) = config.eviction_interval() {
        spawn_eviction(limiter.clone(), every);
    }

    let state = GatewayState::new(provider).with_stream_delay(config.stream_delay());
    let app = build_router(state, limiter, Containment { debug: config.debug });

    // Create socket address
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    info!(
        "Starting Gateway on http://{} ({} requests per {}s per client)",
        addr, config.requests_per_minute, config.window_secs
    );

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Start server; peer addresses feed the rate limiter
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::error::ApiError;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::middleware::Next;
    use axum::response::Response;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn routes() -> Router {
        Router::new().route("/chat", get(|| async { "answered" }))
    }

    async fn send(app: Router) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri("/chat").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    async fn corrupted_bookkeeping(_req: Request, _next: Next) -> Response {
        panic!("window bookkeeping corrupted")
    }

    async fn failing_bookkeeping(_req: Request, _next: Next) -> Result<Response, ApiError> {
        Err(ApiError::Unexpected("window store unavailable".to_string()))
    }

    async fn always_reject(_req: Request, _next: Next) -> StatusCode {
        StatusCode::TOO_MANY_REQUESTS
    }

    #[tokio::test]
    async fn test_panic_in_admission_layer_is_contained() {
        let app = with_middleware(routes(), middleware::from_fn(corrupted_bookkeeping), Containment::default());

        let (status, body) = send(app).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            serde_json::json!({
                "error": "Internal Server Error",
                "message": "An unexpected error occurred",
                "detail": null
            })
        );
    }

    #[tokio::test]
    async fn test_panic_in_admission_layer_shows_detail_in_debug() {
        let app = with_middleware(
            routes(),
            middleware::from_fn(corrupted_bookkeeping),
            Containment { debug: true },
        );

        let (status, body) = send(app).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "window bookkeeping corrupted");
    }

    #[tokio::test]
    async fn test_admission_failure_is_rewritten_by_containment() {
        let app = with_middleware(routes(), middleware::from_fn(failing_bookkeeping), Containment::default());

        let (status, body) = send(app).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "An unexpected error occurred");
        assert!(body["detail"].is_null());
    }

    #[tokio::test]
    async fn test_admission_rejection_passes_containment() {
        let app = with_middleware(routes(), middleware::from_fn(always_reject), Containment::default());

        let (status, _) = send(app).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }
}
