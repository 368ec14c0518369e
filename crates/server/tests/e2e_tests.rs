//! End-to-end tests against the in-process router with a mock resolver.

mod common;

use std::time::Duration;

use axum::http::{header, StatusCode};
use serde_json::{json, Value};
use ytcut_core::resolver::DownloadProgress;
use ytcut_core::testing::MockResolver;
use ytcut_core::{JobId, OrchestratorConfig};

use common::{fixtures, TestConfig, TestFixture};

fn statuses(events: &[Value]) -> Vec<&str> {
    events
        .iter()
        .map(|e| e["status"].as_str().unwrap_or_default())
        .collect()
}

// ============================================================================
// Health, config and metrics
// ============================================================================

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_is_exposed() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/config").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["orchestrator"]["heartbeat_secs"], 60);
    assert!(response.body["downloads"]["dir"].is_string());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new();
    fixture
        .create_job(json!({"url": "https://example.com/watch?v=m", "height": 720}))
        .await;

    let response = fixture.get_raw("/metrics").await;

    assert_eq!(response.status, StatusCode::OK);
    let text = response.text();
    assert!(text.contains("ytcut_jobs_created_total"));
    assert!(text.contains("ytcut_http_requests_total"));
}

// ============================================================================
// Job creation and progress streaming
// ============================================================================

#[tokio::test]
async fn test_full_video_job_streams_to_done() {
    let resolver = MockResolver::new()
        .with_info(fixtures::media_info("My Video", 60.0))
        .with_progress(vec![
            DownloadProgress::downloading(25.0),
            DownloadProgress::downloading(75.0),
            DownloadProgress::finished(),
        ]);
    let fixture = TestFixture::with_resolver(resolver);

    let id = fixture
        .create_job(json!({"url": "https://example.com/watch?v=1", "height": 720}))
        .await;

    let response = fixture
        .get_raw(&format!("/api/v1/jobs/{}/progress", id))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.headers[header::CONTENT_TYPE],
        "text/event-stream"
    );
    assert_eq!(response.headers["x-accel-buffering"], "no");

    let events = response.sse_events();
    let statuses = statuses(&events);
    assert!(statuses.contains(&"downloading"));
    assert_eq!(statuses.iter().filter(|s| **s == "processing").count(), 1);

    let last = events.last().expect("at least one event");
    assert_eq!(last["status"], "done");
    assert_eq!(last["outputFilename"], "My Video.mp4");
    assert_eq!(last["title"], "My Video");
    assert!(fixture.downloads_dir().join("My Video.mp4").exists());
}

#[tokio::test]
async fn test_finished_file_can_be_downloaded() {
    let fixture = TestFixture::with_resolver(
        MockResolver::new().with_info(fixtures::media_info("Song", 30.0)),
    );

    let id = fixture
        .create_job(json!({"url": "https://example.com/watch?v=2", "height": 0}))
        .await;
    let events = fixture
        .get_raw(&format!("/progress/{}", id))
        .await
        .sse_events();
    let done = events.last().expect("terminal event");
    assert_eq!(done["status"], "done");
    assert_eq!(done["outputFilename"], "Song.mp3");
    assert!(done.get("filename").is_none());

    let response = fixture.get_raw("/downloads/Song.mp3").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers[header::CONTENT_TYPE], "audio/mpeg");
    let disposition = response.headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap();
    assert!(disposition.starts_with("attachment;"));
    assert!(disposition.contains("Song.mp3"));
}

#[tokio::test]
async fn test_create_job_rejects_empty_url() {
    let fixture = TestFixture::new();

    let response = fixture.post("/api/v1/jobs", json!({"url": "  "})).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].is_string());
    assert!(fixture.orchestrator.list().await.is_empty());
}

#[tokio::test]
async fn test_create_job_rejects_malformed_json() {
    let fixture = TestFixture::new();

    let response = fixture.post_raw("/api/v1/jobs", "{not json").await;

    assert!(response.status.is_client_error());
}

#[tokio::test]
async fn test_ui_download_alias_creates_job() {
    let fixture = TestFixture::new();

    let response = fixture
        .post("/download", json!({"url": "https://example.com/watch?v=3"}))
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let id = response.body["job_id"].as_str().unwrap();
    let job = fixture.get(&format!("/api/v1/jobs/{}", id)).await;
    assert_eq!(job.status, StatusCode::OK);
    assert_eq!(job.body["id"], id);
}

#[tokio::test]
async fn test_progress_for_unknown_job_is_404() {
    let fixture = TestFixture::new();

    let response = fixture
        .get_raw("/api/v1/jobs/00000000-0000-0000-0000-000000000000/progress")
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_second_listener_is_rejected() {
    let fixture = TestFixture::with_resolver(MockResolver::new().hanging_until_cancelled());

    let id = fixture
        .create_job(json!({"url": "https://example.com/watch?v=4"}))
        .await;
    let _first = fixture
        .orchestrator
        .subscribe(&JobId::from(id.as_str()))
        .await
        .expect("first listener attaches");

    let response = fixture
        .get_raw(&format!("/api/v1/jobs/{}/progress", id))
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);

    fixture
        .post(&format!("/api/v1/jobs/{}/cancel", id), json!({}))
        .await;
}

#[tokio::test]
async fn test_resolver_failure_ends_stream_with_error() {
    let fixture = TestFixture::with_resolver(
        MockResolver::new().with_resolve_error("Video unavailable"),
    );

    let id = fixture
        .create_job(json!({"url": "https://example.com/watch?v=5"}))
        .await;
    let events = fixture
        .get_raw(&format!("/api/v1/jobs/{}/progress", id))
        .await
        .sse_events();

    let last = events.last().expect("terminal event");
    assert_eq!(last["status"], "error");
    assert!(last["message"]
        .as_str()
        .unwrap()
        .contains("Video unavailable"));
}

// ============================================================================
// Cancellation and heartbeats
// ============================================================================

#[tokio::test]
async fn test_cancel_ends_stream_with_cancelled() {
    let fixture = TestFixture::with_resolver(MockResolver::new().hanging_until_cancelled());

    let id = fixture
        .create_job(json!({"url": "https://example.com/watch?v=6"}))
        .await;

    let progress_path = format!("/api/v1/jobs/{}/progress", id);
    let cancel_path = format!("/api/v1/jobs/{}/cancel", id);
    let (stream, cancel) = tokio::join!(fixture.get_raw(&progress_path), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        fixture.post(&cancel_path, json!({})).await
    });

    assert_eq!(cancel.status, StatusCode::OK);
    assert_eq!(cancel.body["cancelled"], true);

    let events = stream.sse_events();
    assert_eq!(events.last().unwrap()["status"], "cancelled");
    assert_eq!(
        statuses(&events).iter().filter(|s| **s == "cancelled").count(),
        1
    );

    // With its listener gone the job leaves the registry after teardown
    let job_id = JobId::from(id.as_str());
    for _ in 0..50 {
        if fixture.orchestrator.get(&job_id).await.is_err() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let again = fixture.post(&cancel_path, json!({})).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_unknown_job_is_404() {
    let fixture = TestFixture::new();

    let response = fixture.post("/cancel/not-a-job", json!({})).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_idle_stream_receives_ping() {
    let fixture = TestFixture::with_config(
        MockResolver::new().hanging_until_cancelled(),
        TestConfig {
            orchestrator: OrchestratorConfig {
                heartbeat_secs: 1,
                ..Default::default()
            },
            ..Default::default()
        },
    );

    let id = fixture
        .create_job(json!({"url": "https://example.com/watch?v=7"}))
        .await;

    let progress_path = format!("/api/v1/jobs/{}/progress", id);
    let cancel_path = format!("/api/v1/jobs/{}/cancel", id);
    let (stream, _) = tokio::join!(fixture.get_raw(&progress_path), async {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        fixture.post(&cancel_path, json!({})).await
    });

    let events = stream.sse_events();
    let statuses = statuses(&events);
    assert!(statuses.contains(&"ping"), "events: {:?}", statuses);
    assert_eq!(statuses.last(), Some(&"cancelled"));
}

// ============================================================================
// Listing and status
// ============================================================================

#[tokio::test]
async fn test_list_and_status() {
    let fixture = TestFixture::with_resolver(MockResolver::new().hanging_until_cancelled());

    let a = fixture
        .create_job(json!({"url": "https://example.com/watch?v=8"}))
        .await;
    fixture
        .create_job(json!({"url": "https://example.com/watch?v=9"}))
        .await;

    let list = fixture.get("/api/v1/jobs").await;
    assert_eq!(list.status, StatusCode::OK);
    assert_eq!(list.body["total"], 2);

    let status = fixture.get("/api/v1/status").await;
    assert_eq!(status.status, StatusCode::OK);
    assert_eq!(status.body["total_jobs"], 2);
    assert_eq!(status.body["active_jobs"], 2);

    let missing = fixture.get("/api/v1/jobs/nope").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    fixture.post(&format!("/cancel/{}", a), json!({})).await;
    let job = fixture.get(&format!("/api/v1/jobs/{}", a)).await;
    assert_eq!(job.body["state"], "cancelled");
}

// ============================================================================
// Media info
// ============================================================================

#[tokio::test]
async fn test_media_info() {
    let fixture = TestFixture::with_resolver(
        MockResolver::new().with_info(fixtures::media_info("Concert", 3725.0)),
    );

    let response = fixture
        .post("/info", json!({"url": "https://example.com/watch?v=10"}))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["title"], "Concert");
    assert_eq!(response.body["duration_str"], "01:02:05");
    assert_eq!(response.body["channel"], "Test Channel");

    let heights: Vec<u64> = response.body["formats"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["height"].as_u64().unwrap())
        .collect();
    assert_eq!(heights, vec![1080, 720, 360, 0]);
}

#[tokio::test]
async fn test_media_info_errors_are_400() {
    let fixture = TestFixture::with_resolver(
        MockResolver::new().with_resolve_error("Unsupported URL"),
    );

    let empty = fixture.post("/api/v1/info", json!({"url": ""})).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let failed = fixture
        .post("/api/v1/info", json!({"url": "https://example.com/x"}))
        .await;
    assert_eq!(failed.status, StatusCode::BAD_REQUEST);
    assert!(failed.body["error"]
        .as_str()
        .unwrap()
        .contains("Unsupported URL"));
}

// ============================================================================
// Files and static UI
// ============================================================================

#[tokio::test]
async fn test_download_existing_file() {
    let fixture = TestFixture::new();
    fixture.write_download("Clip.mp4", b"0123456789");

    let response = fixture.get_raw("/downloads/Clip.mp4").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(response.headers[header::CONTENT_LENGTH], "10");
    assert_eq!(&response.body[..], b"0123456789");
}

#[tokio::test]
async fn test_download_missing_file_is_404() {
    let fixture = TestFixture::new();

    let response = fixture.get_raw("/downloads/nothing.mp4").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_download_rejects_traversal() {
    let fixture = TestFixture::new();
    std::fs::write(fixture.temp_dir.path().join("secret.txt"), "secret").unwrap();

    let response = fixture.get_raw("/downloads/..%2Fsecret.txt").await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_path_serves_index() {
    let fixture = TestFixture::new();

    let response = fixture.get_raw("/some/ui/route").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.text().contains("ytcut"));
}

// ============================================================================
// Clipping with a fake ffmpeg
// ============================================================================

#[cfg(unix)]
#[tokio::test]
async fn test_clip_job_with_fake_ffmpeg() {
    use ytcut_core::testing::FAKE_FFMPEG_OK;

    let tools = tempfile::TempDir::new().unwrap();
    let fixture = TestFixture::with_config(
        MockResolver::new().with_info(fixtures::media_info("Clip Me", 120.0)),
        TestConfig {
            clipper: common::fake_ffmpeg(tools.path(), FAKE_FFMPEG_OK),
            ..Default::default()
        },
    );

    let id = fixture
        .create_job(json!({
            "url": "https://example.com/watch?v=11",
            "height": 720,
            "start": "00:10",
            "end": "00:20"
        }))
        .await;
    let events = fixture
        .get_raw(&format!("/api/v1/jobs/{}/progress", id))
        .await
        .sse_events();

    let statuses = statuses(&events);
    assert!(statuses.contains(&"cutting"), "events: {:?}", statuses);
    let last = events.last().unwrap();
    assert_eq!(last["status"], "done");
    assert_eq!(last["outputFilename"], "Clip Me.mp4");
    assert!(fixture.downloads_dir().join("Clip Me.mp4").exists());
}
