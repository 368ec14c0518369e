//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with a mock resolver injected, enabling E2E testing without yt-dlp or
//! ffmpeg installed.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use ytcut_core::{
    clipper::ClipperConfig,
    config::{DownloadsConfig, ServerConfig},
    testing::MockResolver,
    Config, JobOrchestrator, MediaResolver, OrchestratorConfig,
};
use ytcut_server::state::AppState;

/// Re-export fixtures for test convenience
pub use ytcut_core::testing::fixtures;

/// Test fixture for E2E testing with a mock resolver.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_job_creation() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.post("/api/v1/jobs", json!({
///         "url": "https://example.com/watch?v=1",
///         "height": 720
///     })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Shared orchestrator, for direct registry assertions
    pub orchestrator: Arc<JobOrchestrator>,
    /// Temporary directory holding downloads and the static UI
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Raw response, for streams and files
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// JSON payloads of the `data:` frames in an event stream.
    pub fn sse_events(&self) -> Vec<Value> {
        self.text()
            .split("\n\n")
            .filter_map(|frame| frame.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).expect("frame is JSON"))
            .collect()
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Clipper settings, e.g. a fake ffmpeg
    pub clipper: ClipperConfig,
    /// Orchestrator settings
    pub orchestrator: OrchestratorConfig,
}

impl TestFixture {
    /// Create a new test fixture with a default mock resolver.
    pub fn new() -> Self {
        Self::with_resolver(MockResolver::new())
    }

    pub fn with_resolver(resolver: MockResolver) -> Self {
        Self::with_config(resolver, TestConfig::default())
    }

    /// Create a test fixture with custom configuration.
    pub fn with_config(resolver: MockResolver, test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let downloads = temp_dir.path().join("downloads");
        let static_dir = temp_dir.path().join("static");
        std::fs::create_dir_all(&downloads).expect("Failed to create downloads dir");
        std::fs::create_dir_all(&static_dir).expect("Failed to create static dir");
        std::fs::write(static_dir.join("index.html"), "<html>ytcut</html>")
            .expect("Failed to write index.html");

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
                static_dir,
            },
            downloads: DownloadsConfig {
                dir: downloads.clone(),
            },
            orchestrator: test_config.orchestrator.clone(),
            clipper: test_config.clipper.clone(),
            ..Default::default()
        };

        let resolver: Arc<dyn MediaResolver> = Arc::new(resolver);
        let orchestrator = Arc::new(JobOrchestrator::new(
            config.orchestrator.clone(),
            Arc::clone(&resolver),
            config.clipper.clone(),
            downloads,
        ));

        let state = Arc::new(AppState::new(config, Arc::clone(&orchestrator), resolver));
        let router = ytcut_server::api::create_router(state);

        Self {
            router,
            orchestrator,
            temp_dir,
        }
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.temp_dir.path().join("downloads")
    }

    pub fn write_download(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.downloads_dir().join(name);
        std::fs::write(&path, contents).expect("Failed to write download");
        path
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let raw = self.send("POST", path, Body::from(body.to_string()), true).await;
        to_json(raw)
    }

    /// Send a GET request and keep the raw body (event streams, files).
    ///
    /// Event streams are collected until the server closes them.
    pub async fn get_raw(&self, path: &str) -> RawResponse {
        self.send("GET", path, Body::empty(), false).await
    }

    /// Create a job and return its id.
    pub async fn create_job(&self, body: Value) -> String {
        let response = self.post("/api/v1/jobs", body).await;
        assert_eq!(response.status, StatusCode::CREATED, "body: {}", response.body);
        response.body["job_id"]
            .as_str()
            .expect("job_id in response")
            .to_string()
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let (body, json) = match body {
            Some(json_body) => (Body::from(serde_json::to_vec(&json_body).unwrap()), true),
            None => (Body::empty(), false),
        };
        to_json(self.send(method, path, body, json).await)
    }

    async fn send(&self, method: &str, path: &str, body: Body, json: bool) -> RawResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        if json {
            request_builder = request_builder.header("Content-Type", "application/json");
        }
        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        RawResponse {
            status,
            headers,
            body,
        }
    }
}

fn to_json(raw: RawResponse) -> TestResponse {
    let body: Value = if raw.body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&raw.body).unwrap_or(Value::Null)
    };
    TestResponse {
        status: raw.status,
        body,
    }
}

/// A fake ffmpeg in `dir` running `body`.
#[cfg(unix)]
pub fn fake_ffmpeg(dir: &std::path::Path, body: &str) -> ClipperConfig {
    ClipperConfig {
        ffmpeg_path: ytcut_core::testing::write_fake_tool(dir, "ffmpeg", body),
        ..Default::default()
    }
}
