//! LLM Gateway module
//!
//! HTTP surface: per-client rate limiting and error containment around the
//! completion handlers.

pub mod advanced;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;

pub use config::GatewayConfig;
pub use handlers::GatewayState;
pub use middleware::Containment;
pub use server::{build_router, start_server};
