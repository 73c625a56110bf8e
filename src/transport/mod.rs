//! HTTP transport
//!
//! Wires the index-report and index-state handlers into an axum [`Router`]. The
//! indexing engine is injected here and shared by every request; the handlers
//! themselves hold no other state.

pub mod index;
pub mod precondition;
pub mod response;
pub mod state;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::any};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::{ApiPaths, DEFAULT_MAX_BODY_BYTES, DEFAULT_REQUEST_TIMEOUT_SECS, GatewayConfig};
use crate::engine::{EngineError, Indexer};

pub use precondition::Validator;
pub use response::ErrorBody;

/// Link relation for the index report of a submitted manifest.
pub const REL_INDEX_REPORT: &str = "https://projectquay.io/clair/v1/index_report";
/// Link relation for the vulnerability report of a submitted manifest.
pub const REL_VULNERABILITY_REPORT: &str = "https://projectquay.io/clair/v1/vulnerability_report";

/// Per-request limits shared by the handlers.
#[derive(Debug, Clone)]
pub struct HandlerOptions {
    pub paths: ApiPaths,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            paths: ApiPaths::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl From<&GatewayConfig> for HandlerOptions {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            paths: config.paths.clone(),
            request_timeout: config.request_timeout(),
            max_body_bytes: config.max_body_bytes,
        }
    }
}

pub struct Gateway<E> {
    engine: E,
    options: HandlerOptions,
}

impl<E: Indexer> Gateway<E> {
    pub fn new(engine: E, options: HandlerOptions) -> Self {
        Self { engine, options }
    }

    /// Run an engine call under the request deadline.
    async fn deadline<T, F>(&self, call: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        let limit = self.options.request_timeout;
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| EngineError::Timeout(limit))?
    }

    /// Current engine state as a validator.
    async fn validator(&self) -> Result<Validator, EngineError> {
        let state = self.deadline(self.engine.state()).await?;
        Ok(Validator::from_state(&state))
    }
}

/// Build the router serving the gateway endpoints.
pub fn router<E: Indexer>(engine: E, options: HandlerOptions) -> Router {
    let index_report = options.paths.index_report.clone();
    let index_state = options.paths.index_state.clone();
    let gateway = Arc::new(Gateway::new(engine, options));

    Router::new()
        .route(&index_report, any(index::index_report::<E>))
        .route(&index_state, any(state::index_state::<E>))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

/// Serve `router` until Ctrl-C.
pub async fn serve(listener: TcpListener, router: Router) -> std::io::Result<()> {
    info!(address = ?listener.local_addr().ok(), "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("shutting down"),
                Err(e) => {
                    // Without a signal handler the server runs until killed.
                    error!(error = %e, "unable to listen for shutdown signal");
                    std::future::pending::<()>().await
                }
            }
        })
        .await
}
