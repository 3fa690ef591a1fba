//! prompt-gate binary
//!
//! Rate-limited HTTP gateway in front of an OpenAI-compatible provider

use anyhow::Result;
use clap::Parser;
use prompt_gate::gate::config::GatewayConfig;
use prompt_gate::gate::server::start_server;
use prompt_gate::ProviderConfig;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

/// prompt-gate: rate-limited LLM gateway
#[derive(Parser, Debug)]
#[command(name = "prompt-gate")]
#[command(about = "Rate-limited LLM request gateway", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Provider request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Requests per client per minute
    #[arg(long)]
    rate_limit: Option<usize>,

    /// Pause between streamed frames in milliseconds
    #[arg(long)]
    stream_delay_ms: Option<u64>,

    /// Include failure detail in 500 responses
    #[arg(long)]
    debug: bool,

    /// Validate configuration
    #[arg(long)]
    validate: bool,

    /// Test configuration (test provider connection)
    #[arg(long)]
    test: bool,
}

/// `--config`, then `./prompt-gate.toml`, then `~/.prompt-gate/config.toml`
fn find_config_file(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let local = Path::new("./prompt-gate.toml");
        if local.exists() {
            return Some(local.to_path_buf());
        }
        dirs::home_dir()
            .map(|home| home.join(".prompt-gate").join("config.toml"))
            .filter(|p| p.exists())
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let config_file = find_config_file(args.config.clone());

    // Load configuration
    let mut gateway_config = if let Some(ref config_path) = config_file {
        println!("Loading config from: {}", config_path.display());
        GatewayConfig::from_file(config_path)?
    } else {
        println!("Using default configuration");
        GatewayConfig::default()
    };

    // Override with CLI arguments
    if let Some(host) = args.host {
        gateway_config.host = host;
    }
    if let Some(port) = args.port {
        gateway_config.port = port;
    }
    if let Some(timeout) = args.timeout {
        gateway_config.timeout_secs = timeout;
    }
    if let Some(limit) = args.rate_limit {
        gateway_config.requests_per_minute = limit;
    }
    if let Some(delay) = args.stream_delay_ms {
        gateway_config.stream_delay_ms = delay;
    }
    if args.debug {
        gateway_config.debug = true;
    }

    // Handle validation
    if args.validate {
        return validate_config(&gateway_config);
    }

    // Handle test
    if args.test {
        return test_config(&gateway_config).await;
    }

    gateway_config.validate()?;

    // Start server
    start_server(gateway_config).await
}

/// Validate configuration
fn validate_config(config: &GatewayConfig) -> Result<()> {
    println!("Configuration validation:");
    println!("  Host: {}", config.host);
    println!("  Port: {}", config.port);
    println!("  Timeout: {}s", config.timeout_secs);
    println!(
        "  Rate limit: {} requests / {}s",
        config.requests_per_minute, config.window_secs
    );
    println!("  Stream delay: {}ms", config.stream_delay_ms);
    println!("  Debug: {}", config.debug);

    config.validate()?;

    match ProviderConfig::from_env() {
        Some(provider) => println!("  Provider: {}", provider.api_base()),
        None => println!("  Warning: OPENAI_API_KEY not set; completion endpoints will return 400"),
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Test configuration (test provider connection)
async fn test_config(config: &GatewayConfig) -> Result<()> {
    println!("Testing configuration...");

    let Some(provider) = ProviderConfig::from_env() else {
        println!("Warning: No provider configured (OPENAI_API_KEY not set)");
        println!("✓ Configuration test complete (no provider to test)");
        return Ok(());
    };

    let url = format!("{}/models", provider.api_base().trim_end_matches('/'));
    print!("  Testing {} ... ", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_secs.min(10)))
        .build()?;

    match client
        .get(&url)
        .header("Authorization", format!("Bearer {}", provider.api_key()))
        .send()
        .await
    {
        Ok(resp) => {
            if resp.status().is_success() {
                println!("OK");
            } else if resp.status().as_u16() == 401 || resp.status().as_u16() == 403 {
                println!("Reachable, but the API key was rejected");
            } else {
                println!("HTTP {}", resp.status());
            }
        }
        Err(e) => {
            if e.is_connect() {
                println!("Connection failed");
            } else if e.is_timeout() {
                println!("Timeout");
            } else {
                println!("Error: {}", e);
            }
        }
    }

    println!("\n✓ Configuration test complete");
    Ok(())
}
