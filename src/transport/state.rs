//! Index state endpoint
//!
//! Reports the engine's current state token so clients can tell whether
//! previously produced reports are still current.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{Gateway, response};
use crate::engine::Indexer;
use crate::error::GatewayError;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexState {
    pub state: String,
}

pub async fn index_state<E: Indexer>(
    State(gateway): State<Arc<Gateway<E>>>,
    request: Request,
) -> Response {
    let mut headers = response::json_headers();
    if request.method() != Method::GET {
        let err = GatewayError::MethodNotAllowed { allowed: "GET" };
        return response::error_response(&err, headers);
    }

    let state = match gateway.deadline(gateway.engine.state()).await {
        Ok(state) => state,
        Err(e) => {
            let err = GatewayError::EngineStateUnavailable(e);
            warn!(error = %err, "index state request failed");
            return response::error_response(&err, headers);
        }
    };

    let validator = super::Validator::from_state(&state);
    match validator.header_value() {
        Ok(etag) => {
            headers.insert(header::ETAG, etag);
        }
        Err(err) => return response::error_response(&err, headers),
    }

    if validator.unmodified(request.headers()) {
        return (StatusCode::NOT_MODIFIED, headers).into_response();
    }
    (StatusCode::OK, headers, Json(IndexState { state })).into_response()
}
