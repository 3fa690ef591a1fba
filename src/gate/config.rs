//! Gateway configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Gateway configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Host address to listen on
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Outbound provider request timeout in seconds (default: 120)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Requests admitted per client per window (default: 60)
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: usize,

    /// Rate-limit window in seconds (default: 60)
    #[serde(default = "default_window")]
    pub window_secs: u64,

    /// Pause between replayed stream frames in milliseconds (default: 100)
    #[serde(default = "default_stream_delay")]
    pub stream_delay_ms: u64,

    /// Include failure detail in 500 responses
    #[serde(default)]
    pub debug: bool,

    /// How often idle rate-limit identities are evicted, in seconds (0 disables)
    #[serde(default = "default_eviction_interval")]
    pub eviction_interval_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_secs: default_timeout(),
            requests_per_minute: default_requests_per_minute(),
            window_secs: default_window(),
            stream_delay_ms: default_stream_delay(),
            debug: false,
            eviction_interval_secs: default_eviction_interval(),
        }
    }
}

impl GatewayConfig {
    /// Load gateway configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Check value ranges
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.port < 1024 {
            anyhow::bail!("Invalid port: {} (must be between 1024 and 65535)", self.port);
        }
        if self.timeout_secs < 10 || self.timeout_secs > 600 {
            anyhow::bail!(
                "Invalid timeout: {} (must be between 10 and 600 seconds)",
                self.timeout_secs
            );
        }
        if self.requests_per_minute == 0 {
            anyhow::bail!("Invalid rate limit: must admit at least 1 request per window");
        }
        if self.window_secs == 0 {
            anyhow::bail!("Invalid rate-limit window: must be at least 1 second");
        }
        Ok(())
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn stream_delay(&self) -> Duration {
        Duration::from_millis(self.stream_delay_ms)
    }

    pub fn eviction_interval(&self) -> Option<Duration> {
        (self.eviction_interval_secs > 0).then(|| Duration::from_secs(self.eviction_interval_secs))
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_timeout() -> u64 {
    120
}

fn default_requests_per_minute() -> usize {
    60
}

fn default_window() -> u64 {
    60
}

fn default_stream_delay() -> u64 {
    100
}

fn default_eviction_interval() -> u64 {
    300
}
