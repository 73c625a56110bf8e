//! Command-line argument parsing

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::config::GatewayConfig;

#[derive(Parser, Debug)]
#[command(name = "index-gateway")]
#[command(about = "Accepts image manifests and triggers vulnerability indexing")]
#[command(version, author)]
pub struct Args {
    /// Address to listen on
    #[arg(
        long = "listen",
        short = 'l',
        env = "GATEWAY_LISTEN",
        help = "Socket address the HTTP server binds to"
    )]
    pub listen: Option<String>,

    /// Indexer base URL
    #[arg(
        long = "indexer-url",
        short = 'i',
        env = "GATEWAY_INDEXER_URL",
        help = "Base URL of the indexer that receives submitted manifests"
    )]
    pub indexer_url: Option<String>,

    /// Timeout in seconds for indexer calls
    #[arg(
        long = "timeout",
        short = 't',
        env = "GATEWAY_REQUEST_TIMEOUT",
        help = "Deadline in seconds for each indexer call"
    )]
    pub timeout: Option<u64>,

    /// Maximum accepted manifest size
    #[arg(
        long = "max-body-bytes",
        env = "GATEWAY_MAX_BODY_BYTES",
        help = "Largest manifest body accepted, in bytes"
    )]
    pub max_body_bytes: Option<usize>,

    /// Skip TLS verification
    #[arg(
        long = "skip-tls",
        short = 'k',
        env = "GATEWAY_SKIP_TLS",
        help = "Skip TLS certificate verification when talking to the indexer"
    )]
    pub skip_tls: bool,

    /// Configuration file path
    #[arg(
        long = "config",
        short = 'c',
        env = "GATEWAY_CONFIG",
        help = "Path to a JSON configuration file; flags override its values"
    )]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(long = "verbose", short = 'v', help = "Enable debug logging")]
    pub verbose: bool,

    /// Quiet output
    #[arg(long = "quiet", short = 'q', help = "Only log warnings and errors")]
    pub quiet: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Build the gateway configuration from the config file, if any, and flags.
    pub fn to_config(&self) -> Result<GatewayConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            None => GatewayConfig::default(),
        };

        if let Some(listen) = &self.listen {
            config.listen = listen
                .parse()
                .with_context(|| format!("Invalid listen address {:?}", listen))?;
        }
        if let Some(url) = &self.indexer_url {
            config.indexer_url = url.clone();
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = timeout;
        }
        if let Some(max) = self.max_body_bytes {
            config.max_body_bytes = max;
        }
        if self.skip_tls {
            config.skip_tls = true;
        }

        config.validate()?;
        Ok(config)
    }
}
