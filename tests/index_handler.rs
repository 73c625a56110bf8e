use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use serde_json::json;
use tower::ServiceExt;

use index_gateway::digest::Digest;
use index_gateway::engine::{EngineError, Indexer};
use index_gateway::manifest::{Manifest, native, oci};
use index_gateway::transport::{self, ErrorBody, HandlerOptions};

const INDEX_PATH: &str = "/indexer/api/v1/index_report";
const STATE: &str = "1f2b6c";

#[derive(Default)]
struct FakeIndexer {
    fail_state: bool,
    fail_index: bool,
    delay: Option<Duration>,
    delay_index: Option<Duration>,
    state_calls: AtomicUsize,
    index_calls: AtomicUsize,
    submitted: Mutex<Vec<Manifest>>,
}

#[async_trait]
impl Indexer for FakeIndexer {
    type Report = serde_json::Value;

    async fn state(&self) -> Result<String, EngineError> {
        self.state_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_state {
            return Err(EngineError::Unavailable("database is down".to_string()));
        }
        Ok(STATE.to_string())
    }

    async fn index(&self, manifest: &Manifest) -> Result<Self::Report, EngineError> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay_index {
            tokio::time::sleep(delay).await;
        }
        if self.fail_index {
            return Err(EngineError::Unavailable("queue is full".to_string()));
        }
        self.submitted.lock().unwrap().push(manifest.clone());
        Ok(json!({
            "manifest_hash": manifest.hash,
            "state": "IndexFinished",
            "success": true,
        }))
    }
}

fn app(engine: Arc<FakeIndexer>) -> Router {
    app_with(engine, HandlerOptions::default())
}

fn app_with(engine: Arc<FakeIndexer>, options: HandlerOptions) -> Router {
    transport::router(engine, options)
}

fn post(content_type: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(INDEX_PATH);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder.body(body.into()).unwrap()
}

fn native_body(hash: &Digest) -> String {
    json!({
        "hash": hash.to_string(),
        "layers": [{
            "hash": Digest::sha256(b"layer").to_string(),
            "uri": "http://localhost/layer",
            "headers": {"Authorization": ["Bearer token"]},
        }],
    })
    .to_string()
}

async fn body_json<T: serde::de::DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn error_body(response: Response<Body>) -> ErrorBody {
    body_json(response).await
}

fn links(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::LINK)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_native_manifest_created() {
    let engine = Arc::new(FakeIndexer::default());
    let hash = Digest::sha256(b"image");

    let response = app(engine.clone())
        .oneshot(post(Some(native::MEDIA_TYPE), native_body(&hash)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()[header::ETAG], format!("\"{}\"", STATE).as_str());
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    assert_eq!(location, format!("{}/{}", INDEX_PATH, hash));

    let links = links(&response);
    assert_eq!(links.len(), 2);
    assert!(links.contains(&format!(
        "<{}/{}>; rel=\"https://projectquay.io/clair/v1/index_report\"",
        INDEX_PATH, hash
    )));
    assert!(links.contains(&format!(
        "</matcher/api/v1/vulnerability_report/{}>; rel=\"https://projectquay.io/clair/v1/vulnerability_report\"",
        hash
    )));

    let report: serde_json::Value = body_json(response).await;
    assert_eq!(report["manifest_hash"], hash.to_string());
    assert_eq!(engine.index_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_default_content_types_are_native() {
    let hash = Digest::sha256(b"image");
    for content_type in [None, Some("application/json"), Some("application/json; charset=UTF-8")] {
        let engine = Arc::new(FakeIndexer::default());
        let response = app(engine.clone())
            .oneshot(post(content_type, native_body(&hash)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED, "{:?}", content_type);
        assert_eq!(engine.submitted.lock().unwrap()[0].hash, Some(hash.clone()));
    }
}

#[tokio::test]
async fn test_oci_manifest_is_translated() {
    let engine = Arc::new(FakeIndexer::default());
    let config = Digest::sha256(b"config");
    let layer = Digest::sha256(b"cool layer");
    let body = json!({
        "schemaVersion": 2,
        "mediaType": oci::MEDIA_TYPE,
        "config": {"mediaType": "application/vnd.oci.image.config.v1+json", "digest": config.to_string(), "size": 7},
        "layers": [{
            "mediaType": oci::LAYER_TAR,
            "digest": layer.to_string(),
            "size": 1024,
            "urls": ["http://localhost/real/layer"],
            "annotations": {
                "header:Authorization": "Bearer t",
                "org.opencontainers.image.title": "layer.tar",
            },
        }],
    })
    .to_string();

    let response = app(engine.clone())
        .oneshot(post(Some(oci::MEDIA_TYPE), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let submitted = engine.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    let manifest = &submitted[0];
    assert_eq!(manifest.hash, Some(config));
    assert_eq!(manifest.layers.len(), 1);
    assert_eq!(manifest.layers[0].hash, layer);
    assert_eq!(manifest.layers[0].uri, "http://localhost/real/layer");
    assert_eq!(manifest.layers[0].headers.len(), 1);
    assert_eq!(manifest.layers[0].headers["Authorization"], vec!["Bearer t".to_string()]);
}

#[tokio::test]
async fn test_oci_missing_urls_rejected() {
    let engine = Arc::new(FakeIndexer::default());
    let body = json!({
        "config": {"digest": Digest::sha256(b"config").to_string()},
        "layers": [
            {"mediaType": oci::LAYER_TAR, "digest": Digest::sha256(b"a").to_string(), "urls": ["http://localhost/a"]},
            {"mediaType": oci::LAYER_TAR_GZIP, "digest": Digest::sha256(b"b").to_string()},
        ],
    })
    .to_string();

    let response = app(engine.clone())
        .oneshot(post(Some(oci::MEDIA_TYPE), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(links(&response).is_empty());
    let err = error_body(response).await;
    assert_eq!(err.code, "bad-request");
    assert!(err.message.contains(&Digest::sha256(b"b").to_string()));
    assert_eq!(engine.index_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unsupported_content_type() {
    let engine = Arc::new(FakeIndexer::default());
    let response = app(engine.clone())
        .oneshot(post(Some("text/plain; charset=UTF-8"), native_body(&Digest::sha256(b"image"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let err = error_body(response).await;
    assert_eq!(err.code, "bad-request");
    assert!(err.message.contains("text/plain"));
    assert_eq!(engine.index_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_incomplete_manifest() {
    for body in ["{}".to_string(), json!({"hash": Digest::sha256(b"image").to_string()}).to_string()] {
        let engine = Arc::new(FakeIndexer::default());
        let response = app(engine.clone()).oneshot(post(None, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(error_body(response).await.message.contains("bogus manifest"));
        assert_eq!(engine.index_calls.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn test_invalid_body() {
    let engine = Arc::new(FakeIndexer::default());
    let response = app(engine.clone()).oneshot(post(None, "\"\"")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_body(response).await.message.contains("failed to deserialize manifest"));
}

#[tokio::test]
async fn test_body_too_large() {
    let engine = Arc::new(FakeIndexer::default());
    let options = HandlerOptions {
        max_body_bytes: 16,
        ..HandlerOptions::default()
    };
    let response = app_with(engine.clone(), options)
        .oneshot(post(None, native_body(&Digest::sha256(b"image"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(engine.index_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_wrong_method() {
    for method in ["GET", "PUT", "DELETE"] {
        let engine = Arc::new(FakeIndexer::default());
        let request = Request::builder()
            .method(method)
            .uri(INDEX_PATH)
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("not a manifest"))
            .unwrap();
        let response = app(engine.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let err = error_body(response).await;
        assert_eq!(err.code, "method-not-allowed");
        assert_eq!(engine.state_calls.load(Ordering::SeqCst), 0);
        assert_eq!(engine.index_calls.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn test_precondition_failed() {
    let engine = Arc::new(FakeIndexer::default());
    let hash = Digest::sha256(b"image");
    let mut request = post(None, native_body(&hash));
    request
        .headers_mut()
        .insert(header::IF_NONE_MATCH, format!("\"{}\"", STATE).parse().unwrap());

    let response = app(engine.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
    assert_eq!(links(&response).len(), 2);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.is_empty());
    assert_eq!(engine.index_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stale_validator_submits() {
    let engine = Arc::new(FakeIndexer::default());
    let mut request = post(None, native_body(&Digest::sha256(b"image")));
    request
        .headers_mut()
        .insert(header::IF_NONE_MATCH, "\"previous\"".parse().unwrap());

    let response = app(engine.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(engine.index_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_malformed_input_reported_before_precondition() {
    let engine = Arc::new(FakeIndexer::default());
    let mut request = post(None, "{}");
    request
        .headers_mut()
        .insert(header::IF_NONE_MATCH, format!("\"{}\"", STATE).parse().unwrap());

    let response = app(engine).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_state_failure_skips_body() {
    let engine = Arc::new(FakeIndexer {
        fail_state: true,
        ..FakeIndexer::default()
    });
    // An unsupported content type would be a 400 if the body were looked at.
    let response = app(engine.clone())
        .oneshot(post(Some("text/plain"), "garbage"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let err = error_body(response).await;
    assert_eq!(err.code, "internal-error");
    assert!(err.message.contains("database is down"));
    assert_eq!(engine.index_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_submission_failure_retracts_links() {
    let engine = Arc::new(FakeIndexer {
        fail_index: true,
        ..FakeIndexer::default()
    });
    let response = app(engine.clone())
        .oneshot(post(None, native_body(&Digest::sha256(b"image"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(links(&response).is_empty());
    assert!(response.headers().get(header::LOCATION).is_none());
    assert!(response.headers().get(header::ETAG).is_none());
    let err = error_body(response).await;
    assert_eq!(err.code, "index-error");
    assert!(err.message.contains("queue is full"));
    assert_eq!(engine.index_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_engine_timeout() {
    let engine = Arc::new(FakeIndexer {
        delay: Some(Duration::from_secs(5)),
        ..FakeIndexer::default()
    });
    let options = HandlerOptions {
        request_timeout: Duration::from_millis(50),
        ..HandlerOptions::default()
    };
    let response = app_with(engine.clone(), options)
        .oneshot(post(None, native_body(&Digest::sha256(b"image"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_body(response).await.code, "internal-error");
    assert_eq!(engine.index_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_submission_timeout() {
    let engine = Arc::new(FakeIndexer {
        delay_index: Some(Duration::from_secs(5)),
        ..FakeIndexer::default()
    });
    let options = HandlerOptions {
        request_timeout: Duration::from_millis(50),
        ..HandlerOptions::default()
    };
    let response = app_with(engine.clone(), options)
        .oneshot(post(None, native_body(&Digest::sha256(b"image"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(links(&response).is_empty());
    assert!(response.headers().get(header::ETAG).is_none());
    assert!(response.headers().get(header::LOCATION).is_none());
    assert_eq!(error_body(response).await.code, "index-error");
    assert_eq!(engine.state_calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.index_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_submissions() {
    let engine = Arc::new(FakeIndexer::default());
    let router = app(engine.clone());
    let hash = Digest::sha256(b"image");

    let requests = (0..16).map(|_| router.clone().oneshot(post(None, native_body(&hash))));
    let responses = futures::future::join_all(requests).await;
    for response in responses {
        assert_eq!(response.unwrap().status(), StatusCode::CREATED);
    }
    // Deduplication is the engine's job; every request reaches it.
    assert_eq!(engine.index_calls.load(Ordering::SeqCst), 16);
}
