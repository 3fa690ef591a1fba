//! Provider configuration
//!
//! The provider credential is read once at process start from the environment:
//! - `OPENAI_API_KEY` - API key (empty or placeholder values count as absent)
//! - `OPENAI_API_BASE` - API base URL (default: `https://api.openai.com/v1`)
//!
//! A `.env` file in the working directory is loaded first when present.

use std::fmt;
use std::time::Duration;

/// Default OpenAI API base URL
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Value shipped in sample `.env` files; treated as "no key"
pub const PLACEHOLDER_API_KEY: &str = "your_openai_api_key_here";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for the upstream LLM provider
#[derive(Clone)]
pub struct ProviderConfig {
    /// API base URL
    pub api_base: String,

    /// API key
    pub api_key: String,

    /// Outbound request timeout in seconds
    pub timeout_secs: u64,
}

// The key stays out of logs
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ProviderConfig {
    /// Create an OpenAI-compatible provider configuration
    pub fn openai(api_base: String, api_key: String) -> Self {
        ProviderConfig {
            api_base,
            api_key,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Override the outbound timeout
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Load configuration from the process environment.
    ///
    /// Returns `None` when no usable credential is present; the gateway keeps
    /// running in that case and completion routes report "not configured".
    pub fn from_env() -> Option<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("Failed to read .env file: {}", e);
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENAI_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && k != PLACEHOLDER_API_KEY)?;

        let api_base = lookup("OPENAI_API_BASE")
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Some(ProviderConfig::openai(api_base, api_key))
    }

    /// Get the API key
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the API base URL
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Outbound request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
