//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the ytcut server:
//! - HTTP request metrics (latency, counts)
//! - Progress stream metrics (open streams, events delivered)
//! - Completed-file downloads
//! - Job and orchestrator status (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use regex_lite::Regex;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ytcut_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ytcut_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ytcut_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Progress Stream Metrics
// =============================================================================

/// Progress streams currently open.
pub static PROGRESS_STREAMS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ytcut_progress_streams_active",
        "Number of open progress streams",
    )
    .unwrap()
});

/// Total progress streams opened (cumulative).
pub static PROGRESS_STREAMS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ytcut_progress_streams_total",
        "Total progress streams opened since startup",
    )
    .unwrap()
});

/// Progress events delivered by status.
pub static PROGRESS_EVENTS_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ytcut_progress_events_sent_total", "Progress events sent"),
        &["status"],
    )
    .unwrap()
});

/// Completed files served.
pub static FILES_SERVED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ytcut_files_served_total",
        "Total completed files served",
    )
    .unwrap()
});

// =============================================================================
// Job Metrics (collected dynamically)
// =============================================================================

/// Jobs held by the registry, by state.
pub static JOBS_BY_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("ytcut_jobs_by_state", "Current job count by state"),
        &["state"],
    )
    .unwrap()
});

/// Clip processes currently running.
pub static CLIP_PROCESSES_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ytcut_clip_processes_running",
        "Number of running clip processes",
    )
    .unwrap()
});

/// Orchestrator running state (1 = running, 0 = stopped).
pub static ORCHESTRATOR_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ytcut_orchestrator_running",
        "Whether the orchestrator is running (1) or stopped (0)",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Progress streams
    registry
        .register(Box::new(PROGRESS_STREAMS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(PROGRESS_STREAMS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(PROGRESS_EVENTS_SENT.clone()))
        .unwrap();
    registry
        .register(Box::new(FILES_SERVED_TOTAL.clone()))
        .unwrap();

    // Jobs
    registry.register(Box::new(JOBS_BY_STATE.clone())).unwrap();
    registry
        .register(Box::new(CLIP_PROCESSES_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(ORCHESTRATOR_RUNNING.clone()))
        .unwrap();

    // Core metrics (jobs created/finished, kills, heartbeats)
    for metric in ytcut_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the gauges reflect the live registry.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let orchestrator = state.orchestrator();
    ORCHESTRATOR_RUNNING.set(if orchestrator.is_running() { 1 } else { 0 });

    let jobs = orchestrator.list().await;
    for job_state in [
        ytcut_core::JobState::Pending,
        ytcut_core::JobState::Downloading,
        ytcut_core::JobState::Processing,
        ytcut_core::JobState::Cutting,
        ytcut_core::JobState::Done,
        ytcut_core::JobState::Error,
        ytcut_core::JobState::Cancelled,
    ] {
        let count = jobs.iter().filter(|j| j.state == job_state).count();
        JOBS_BY_STATE
            .with_label_values(&[job_state.as_str()])
            .set(count as i64);
    }
    CLIP_PROCESSES_RUNNING.set(jobs.iter().filter(|j| j.process_running).count() as i64);
}

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

static FILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/downloads/.+$").unwrap());

/// Normalize a path for metric labels (replace IDs and file names with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_RE.replace_all(path, "{id}");
    let result = FILE_RE.replace(&result, "/downloads/{file}");
    result.to_string()
}
