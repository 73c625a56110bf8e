//! Indexing engine collaborator
//!
//! The gateway never indexes anything itself. It reads the engine's global
//! state token and hands validated manifests to an [`Indexer`]. Deduplication
//! of concurrent identical submissions is the engine's job.

pub mod remote;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::manifest::Manifest;

pub use remote::{RemoteIndexer, RemoteIndexerBuilder};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("indexer unavailable: {0}")]
    Unavailable(String),
    #[error("indexer did not answer within {0:?}")]
    Timeout(std::time::Duration),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("indexer returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("unable to decode indexer response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Indexing engine operations used by the gateway.
///
/// Both calls may block for a long time. Callers bound them with a deadline,
/// and dropping the returned future must be enough to cancel them.
#[async_trait]
pub trait Indexer: Send + Sync + 'static {
    /// Report produced by a submission. Streamed to the client verbatim.
    type Report: Serialize + Send + Sync + 'static;

    /// Opaque token that changes whenever the engine's global state does.
    async fn state(&self) -> Result<String, EngineError>;

    /// Submit a manifest for indexing.
    ///
    /// Must tolerate repeated submissions of the same manifest hash.
    async fn index(&self, manifest: &Manifest) -> Result<Self::Report, EngineError>;
}

#[async_trait]
impl<T: Indexer> Indexer for std::sync::Arc<T> {
    type Report = T::Report;

    async fn state(&self) -> Result<String, EngineError> {
        (**self).state().await
    }

    async fn index(&self, manifest: &Manifest) -> Result<Self::Report, EngineError> {
        (**self).index(manifest).await
    }
}
