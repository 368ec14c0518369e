//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Jobs (created, finished by outcome, duration by strategy)
//! - Clip processes (kills on cancellation)
//! - Progress delivery (heartbeats)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Jobs
// =============================================================================

/// Jobs created total.
pub static JOBS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("ytcut_jobs_created_total", "Total jobs created").unwrap()
});

/// Jobs finished total by outcome.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ytcut_jobs_finished_total", "Total jobs finished"),
        &["outcome"], // "done", "error", "cancelled"
    )
    .unwrap()
});

/// Job duration in seconds.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("ytcut_job_duration_seconds", "Duration of jobs")
            .buckets(vec![1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["strategy"], // "full_video", "full_audio", "clip_video", "clip_audio"
    )
    .unwrap()
});

// =============================================================================
// Clip processes & delivery
// =============================================================================

/// Clip processes killed by cancellation.
pub static CLIP_PROCESSES_KILLED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ytcut_clip_processes_killed_total",
        "Total clip processes killed on cancellation",
    )
    .unwrap()
});

/// Heartbeats sent to idle listeners.
pub static PROGRESS_HEARTBEATS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ytcut_progress_heartbeats_total",
        "Total heartbeat events delivered to idle listeners",
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_CREATED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(CLIP_PROCESSES_KILLED.clone()),
        Box::new(PROGRESS_HEARTBEATS.clone()),
    ]
}
