//! Conditional request handling
//!
//! The engine's state token, quoted, is used as a strong entity validator. A
//! client that already holds the current validator can send it back in
//! `If-None-Match` and skip a submission that would change nothing.

use axum::http::{HeaderMap, HeaderValue, header::IF_NONE_MATCH};

use crate::error::{GatewayError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator(String);

impl Validator {
    /// Quote an engine state token.
    pub fn from_state(state: &str) -> Self {
        Validator(format!("\"{}\"", state))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn header_value(&self) -> Result<HeaderValue> {
        HeaderValue::from_str(&self.0).map_err(|e| {
            GatewayError::Internal(format!("indexer state is not a valid validator: {}", e))
        })
    }

    /// True if any `If-None-Match` entry is exactly this validator.
    pub fn unmodified(&self, headers: &HeaderMap) -> bool {
        headers
            .get_all(IF_NONE_MATCH)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .any(|candidate| candidate.trim() == self.0)
    }
}
