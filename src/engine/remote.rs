//! HTTP client for a remote indexer
//!
//! Talks to an indexer that exposes the index-state and index-report endpoints
//! over HTTP, so the gateway can run as a separate process in front of it.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{EngineError, Indexer};
use crate::manifest::Manifest;

pub const INDEX_STATE_PATH: &str = "/indexer/api/v1/index_state";
pub const INDEX_REPORT_PATH: &str = "/indexer/api/v1/index_report";

#[derive(Debug, Deserialize)]
struct StateResponse {
    state: String,
}

pub struct RemoteIndexerBuilder {
    address: Url,
    timeout: Option<Duration>,
    skip_tls: bool,
}

impl RemoteIndexerBuilder {
    pub fn new(address: Url) -> Self {
        Self {
            address,
            timeout: None,
            skip_tls: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.skip_tls = skip_tls;
        self
    }

    pub fn build(self) -> Result<RemoteIndexer, EngineError> {
        let mut builder = Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if self.skip_tls {
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        let client = builder.build()?;

        Ok(RemoteIndexer {
            client,
            state_url: join(&self.address, INDEX_STATE_PATH)?,
            report_url: join(&self.address, INDEX_REPORT_PATH)?,
        })
    }
}

fn join(base: &Url, path: &str) -> Result<Url, EngineError> {
    // Keep any path prefix the base carries, e.g. behind a reverse proxy.
    if base.cannot_be_a_base() {
        return Err(EngineError::Unavailable(format!(
            "indexer address {} cannot carry a path",
            base
        )));
    }
    let mut joined = base.clone();
    let prefix = base.path().trim_end_matches('/');
    joined.set_path(&format!("{}{}", prefix, path));
    Ok(joined)
}

#[derive(Debug, Clone)]
pub struct RemoteIndexer {
    client: Client,
    state_url: Url,
    report_url: Url,
}

impl RemoteIndexer {
    pub fn builder(address: Url) -> RemoteIndexerBuilder {
        RemoteIndexerBuilder::new(address)
    }

    pub fn state_url(&self) -> &Url {
        &self.state_url
    }

    pub fn report_url(&self) -> &Url {
        &self.report_url
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(error = %e, %status, "unable to read indexer error body");
                String::new()
            }
        };
        Err(EngineError::Status { status, body })
    }
}

#[async_trait]
impl Indexer for RemoteIndexer {
    type Report = serde_json::Value;

    async fn state(&self) -> Result<String, EngineError> {
        let response = self.client.get(self.state_url.clone()).send().await?;
        let response = Self::check(response).await?;
        let bytes = response.bytes().await?;
        let state: StateResponse = serde_json::from_slice(&bytes)?;
        Ok(state.state)
    }

    async fn index(&self, manifest: &Manifest) -> Result<Self::Report, EngineError> {
        let response = self
            .client
            .post(self.report_url.clone())
            .json(manifest)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
