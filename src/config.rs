//! Configuration module for the gateway's listener, indexer and routes

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

use crate::digest::Digest;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:6060";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Where each resource lives. Discovery links and `Location` are built from these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiPaths {
    pub index_report: String,
    pub index_state: String,
    pub vulnerability_report: String,
}

impl Default for ApiPaths {
    fn default() -> Self {
        Self {
            index_report: "/indexer/api/v1/index_report".to_string(),
            index_state: "/indexer/api/v1/index_state".to_string(),
            vulnerability_report: "/matcher/api/v1/vulnerability_report".to_string(),
        }
    }
}

impl ApiPaths {
    pub fn index_report_for(&self, digest: &Digest) -> String {
        format!("{}/{}", self.index_report.trim_end_matches('/'), digest)
    }

    pub fn vulnerability_report_for(&self, digest: &Digest) -> String {
        format!("{}/{}", self.vulnerability_report.trim_end_matches('/'), digest)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, path) in [
            ("index report", &self.index_report),
            ("index state", &self.index_state),
            ("vulnerability report", &self.vulnerability_report),
        ] {
            if !path.starts_with('/') {
                bail!("{} path must start with '/': {:?}", name, path);
            }
            // Paths end up inside Link and Location header values.
            if !path.chars().all(|c| c.is_ascii_graphic()) || path.contains(['<', '>', ',', ';']) {
                bail!("{} path contains characters not allowed in a header: {:?}", name, path);
            }
        }
        if self.index_report == self.index_state {
            bail!("index report and index state paths must differ");
        }
        Ok(())
    }
}

/// Fields missing from a config file take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub listen: SocketAddr,
    pub indexer_url: String,
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
    pub skip_tls: bool,
    pub paths: ApiPaths,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 6060)),
            indexer_url: String::new(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            skip_tls: false,
            paths: ApiPaths::default(),
        }
    }
}

impl GatewayConfig {
    pub fn new(listen: &str, indexer_url: &str) -> Result<Self> {
        let listen = listen
            .parse()
            .map_err(|e| anyhow!("Invalid listen address {:?}: {}", listen, e))?;
        Ok(GatewayConfig {
            listen,
            indexer_url: indexer_url.to_string(),
            ..GatewayConfig::default()
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn indexer_url(&self) -> Result<Url> {
        if self.indexer_url.trim().is_empty() {
            bail!("Indexer URL cannot be empty");
        }
        let url = Url::parse(&self.indexer_url)
            .map_err(|e| anyhow!("Invalid indexer URL {:?}: {}", self.indexer_url, e))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(anyhow!("Unsupported indexer URL scheme {:?}", other)),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.indexer_url()?;
        if self.request_timeout_secs == 0 {
            bail!("Request timeout must be at least one second");
        }
        if self.max_body_bytes == 0 {
            bail!("Maximum body size must be positive");
        }
        self.paths.validate()
    }
}
