//! Response writing
//!
//! Errors are rendered as `{"code": ..., "message": ...}`. Successful reports are
//! encoded while they stream out: once the status line is committed an encoding
//! failure cannot become an error response, so it is only logged.

use std::convert::Infallible;
use std::io::{self, Write};

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header::ALLOW, header::CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::error::GatewayError;

const CHUNK_SIZE: usize = 8 * 1024;
const CHANNEL_DEPTH: usize = 8;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

pub fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

/// Render an error. Precondition failures carry no body.
pub fn error_response(err: &GatewayError, mut headers: HeaderMap) -> Response {
    let status = err.status();
    match err {
        GatewayError::PreconditionFailed => return (status, headers).into_response(),
        GatewayError::MethodNotAllowed { allowed } => {
            headers.insert(ALLOW, HeaderValue::from_static(*allowed));
        }
        _ => {}
    }
    let body = ErrorBody {
        code: err.code().to_string(),
        message: err.to_string(),
    };
    match serde_json::to_vec(&body) {
        Ok(bytes) => (status, headers, bytes).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode error body");
            (status, headers).into_response()
        }
    }
}

/// Logs a failure that happened after the response status was committed.
///
/// Record the outcome of the write; the failure, if any, is logged when the
/// guard goes out of scope.
pub struct PostCommitGuard {
    what: &'static str,
    failure: Option<String>,
}

impl PostCommitGuard {
    pub fn new(what: &'static str) -> Self {
        Self {
            what,
            failure: None,
        }
    }

    pub fn record<E: std::fmt::Display>(&mut self, result: Result<(), E>) {
        if let Err(e) = result {
            self.failure = Some(e.to_string());
        }
    }

    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }
}

impl Drop for PostCommitGuard {
    fn drop(&mut self) {
        match &self.failure {
            Some(failure) => error!(what = self.what, error = %failure, "error writing response"),
            None => debug!(what = self.what, "response written"),
        }
    }
}

/// Buffers encoder output and forwards it to the response body in chunks.
struct ChunkWriter {
    tx: mpsc::Sender<Bytes>,
    buf: Vec<u8>,
}

impl ChunkWriter {
    fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            tx,
            buf: Vec::with_capacity(CHUNK_SIZE),
        }
    }

    fn send(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::replace(&mut self.buf, Vec::with_capacity(CHUNK_SIZE)));
        self.tx
            .blocking_send(chunk)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
    }
}

impl Write for ChunkWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        if self.buf.len() >= CHUNK_SIZE {
            self.send()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send()
    }
}

fn encode<T: Serialize>(w: &mut ChunkWriter, value: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *w, value)?;
    w.write_all(b"\n")?;
    w.flush()
}

/// Commit `status` and `headers`, then stream `value` as JSON.
///
/// Must be called from within a Tokio runtime.
pub fn stream_json<T>(status: StatusCode, headers: HeaderMap, value: T, what: &'static str) -> Response
where
    T: Serialize + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Bytes>(CHANNEL_DEPTH);

    tokio::task::spawn_blocking(move || {
        let mut guard = PostCommitGuard::new(what);
        let mut writer = ChunkWriter::new(tx);
        guard.record(encode(&mut writer, &value));
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (Ok::<_, Infallible>(chunk), rx))
    });

    (status, headers, Body::from_stream(stream)).into_response()
}
