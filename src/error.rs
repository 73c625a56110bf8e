//! Error handling module for the index gateway
//!
//! [`GatewayError`] is the taxonomy every request can end in. Each variant knows
//! the HTTP status and the short machine-readable code it is rendered with.

use axum::http::StatusCode;
use thiserror::Error;

use crate::engine::EngineError;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("endpoint only allows {allowed}")]
    MethodNotAllowed { allowed: &'static str },

    #[error("failed to deserialize manifest: {0}")]
    InvalidBody(String),

    #[error("unknown content-type {0:?}")]
    UnsupportedMediaType(String),

    #[error("malformed digest {input:?}: {reason}")]
    MalformedDigest { input: String, reason: String },

    #[error("missing URLs for layer {index} ({digest:?})")]
    MissingLocation { index: usize, digest: String },

    #[error("invalid media type {media_type:?} for layer {index} ({digest:?})")]
    UnsupportedLayerType {
        index: usize,
        digest: String,
        media_type: String,
    },

    #[error("bogus manifest: {0}")]
    IncompleteManifest(String),

    #[error("precondition failed")]
    PreconditionFailed,

    #[error("could not retrieve indexer state: {0}")]
    EngineStateUnavailable(EngineError),

    #[error("failed to start scan: {0}")]
    SubmissionFailed(EngineError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn malformed_digest(input: &str, reason: impl Into<String>) -> Self {
        GatewayError::MalformedDigest {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// Wraps a digest error with the position of the layer it came from.
    pub fn in_layer(self, index: usize) -> Self {
        match self {
            GatewayError::MalformedDigest { input, reason } => GatewayError::MalformedDigest {
                input,
                reason: format!("layer {}: {}", index, reason),
            },
            other => other,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::InvalidBody(_)
            | GatewayError::UnsupportedMediaType(_)
            | GatewayError::MalformedDigest { .. }
            | GatewayError::MissingLocation { .. }
            | GatewayError::UnsupportedLayerType { .. }
            | GatewayError::IncompleteManifest(_) => StatusCode::BAD_REQUEST,
            GatewayError::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            GatewayError::EngineStateUnavailable(_)
            | GatewayError::SubmissionFailed(_)
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::MethodNotAllowed { .. } => "method-not-allowed",
            GatewayError::InvalidBody(_)
            | GatewayError::UnsupportedMediaType(_)
            | GatewayError::MalformedDigest { .. }
            | GatewayError::MissingLocation { .. }
            | GatewayError::UnsupportedLayerType { .. }
            | GatewayError::IncompleteManifest(_) => "bad-request",
            GatewayError::PreconditionFailed => "precondition-failed",
            GatewayError::EngineStateUnavailable(_) | GatewayError::Internal(_) => "internal-error",
            GatewayError::SubmissionFailed(_) => "index-error",
        }
    }

    /// True for errors caused by the submitted manifest rather than the engine.
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::InvalidBody(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
