//! Index report submission
//!
//! `POST` a manifest to start indexing it. The request moves through: method
//! check, engine state fetch, body decode, validation, precondition check,
//! submission, and finally the streamed report. Any failure before the report
//! starts streaming produces an error response instead.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::Response;
use tracing::{debug, info, warn};

use super::{Gateway, REL_INDEX_REPORT, REL_VULNERABILITY_REPORT, response};
use crate::engine::Indexer;
use crate::error::{GatewayError, Result};
use crate::manifest::ManifestFormat;

pub async fn index_report<E: Indexer>(
    State(gateway): State<Arc<Gateway<E>>>,
    request: Request,
) -> Response {
    let mut headers = response::json_headers();
    match submit(&gateway, request, &mut headers).await {
        Ok(report) => response::stream_json(StatusCode::CREATED, headers, report, "index report"),
        Err(err) => {
            if err.is_client_error() {
                debug!(error = %err, status = %err.status(), "index request rejected");
            } else {
                warn!(error = %err, "index request failed");
            }
            response::error_response(&err, headers)
        }
    }
}

async fn submit<E: Indexer>(
    gateway: &Gateway<E>,
    request: Request,
    headers: &mut HeaderMap,
) -> Result<E::Report> {
    if request.method() != Method::POST {
        return Err(GatewayError::MethodNotAllowed { allowed: "POST" });
    }

    // Fetch state first so an unavailable engine costs no body parsing.
    let validator = gateway
        .validator()
        .await
        .map_err(GatewayError::EngineStateUnavailable)?;
    let etag = validator.header_value()?;

    let (parts, body) = request.into_parts();
    let content_type = match parts.headers.get(header::CONTENT_TYPE) {
        Some(value) => value
            .to_str()
            .map_err(|_| GatewayError::UnsupportedMediaType(format!("{:?}", value)))?,
        None => "",
    };
    let format = ManifestFormat::from_content_type(content_type)?;

    let body = axum::body::to_bytes(body, gateway.options.max_body_bytes)
        .await
        .map_err(|e| GatewayError::InvalidBody(format!("unable to read body: {}", e)))?;
    let manifest = format.canonicalize(&body)?;
    drop(body);
    let hash = manifest.validate()?.clone();

    debug!(
        manifest = %hash,
        format = %format,
        layers = manifest.layers.len(),
        "manifest accepted"
    );

    let paths = &gateway.options.paths;
    let next = paths.index_report_for(&hash);
    let location = header_value(&next)?;
    append_link(headers, &next, REL_INDEX_REPORT)?;
    append_link(headers, &paths.vulnerability_report_for(&hash), REL_VULNERABILITY_REPORT)?;

    if validator.unmodified(&parts.headers) {
        debug!(manifest = %hash, validator = validator.as_str(), "indexer state unchanged");
        return Err(GatewayError::PreconditionFailed);
    }

    let report = match gateway.deadline(gateway.engine.index(&manifest)).await {
        Ok(report) => report,
        Err(e) => {
            // The linked resources will not exist.
            headers.remove(header::LINK);
            return Err(GatewayError::SubmissionFailed(e));
        }
    };

    info!(manifest = %hash, layers = manifest.layers.len(), "manifest submitted for indexing");

    headers.insert(header::ETAG, etag);
    headers.insert(header::LOCATION, location);
    Ok(report)
}

fn append_link(headers: &mut HeaderMap, target: &str, rel: &str) -> Result<()> {
    headers.append(
        header::LINK,
        header_value(&format!("<{}>; rel=\"{}\"", target, rel))?,
    );
    Ok(())
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| GatewayError::Internal(format!("invalid header value {:?}: {}", value, e)))
}
