//! Types for jobs and their progress events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque job identifier, fresh per creation request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generates a new random job id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a job.
///
/// `Done`, `Error` and `Cancelled` are terminal: once reached, the state never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Downloading,
    Processing,
    Cutting,
    Done,
    Error,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Processing => "processing",
            Self::Cutting => "cutting",
            Self::Done => "done",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status carried by a progress event: every job state plus the synthetic `ping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Pending,
    Downloading,
    Processing,
    Cutting,
    Done,
    Error,
    Cancelled,
    Ping,
}

impl ProgressStatus {
    /// The job state this status moves the job into, `None` for heartbeats.
    pub fn job_state(&self) -> Option<JobState> {
        match self {
            Self::Pending => Some(JobState::Pending),
            Self::Downloading => Some(JobState::Downloading),
            Self::Processing => Some(JobState::Processing),
            Self::Cutting => Some(JobState::Cutting),
            Self::Done => Some(JobState::Done),
            Self::Error => Some(JobState::Error),
            Self::Cancelled => Some(JobState::Cancelled),
            Self::Ping => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self.job_state() {
            Some(state) => state.as_str(),
            None => "ping",
        }
    }
}

/// One progress update for a job, serialized as a single stream frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub status: ProgressStatus,
    /// Completion percentage, 0-100, one decimal place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pct: Option<f64>,
    /// Display throughput, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
    /// Display ETA, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloaded_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressEvent {
    pub fn new(status: ProgressStatus) -> Self {
        Self {
            status,
            pct: None,
            speed: None,
            eta: None,
            downloaded_bytes: None,
            total_bytes: None,
            output_filename: None,
            title: None,
            message: None,
        }
    }

    /// Heartbeat frame for an idle listener.
    pub fn ping() -> Self {
        Self::new(ProgressStatus::Ping)
    }

    pub fn downloading(pct: f64) -> Self {
        Self::new(ProgressStatus::Downloading).with_pct(pct)
    }

    /// Bytes are fully retrieved; post-processing has no further granularity.
    pub fn processing() -> Self {
        Self::new(ProgressStatus::Processing).with_pct(100.0)
    }

    pub fn cutting(pct: f64) -> Self {
        Self::new(ProgressStatus::Cutting).with_pct(pct)
    }

    pub fn done(output_filename: impl Into<String>, title: impl Into<String>) -> Self {
        let mut event = Self::new(ProgressStatus::Done).with_pct(100.0);
        event.output_filename = Some(output_filename.into());
        event.title = Some(title.into());
        event
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ProgressStatus::Error).with_message(message)
    }

    pub fn cancelled() -> Self {
        Self::new(ProgressStatus::Cancelled)
    }

    pub fn with_pct(mut self, pct: f64) -> Self {
        self.pct = Some(normalize_pct(pct));
        self
    }

    pub fn with_speed(mut self, speed: Option<String>) -> Self {
        self.speed = speed.filter(|s| !s.is_empty());
        self
    }

    pub fn with_eta(mut self, eta: Option<String>) -> Self {
        self.eta = eta.filter(|s| !s.is_empty());
        self
    }

    pub fn with_bytes(mut self, downloaded: Option<u64>, total: Option<u64>) -> Self {
        self.downloaded_bytes = downloaded;
        self.total_bytes = total;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// JSON payload of the event's server-sent-events `data:` line.
    pub fn sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Canonical percentage: clamped to `[0, 100]`, rounded to one decimal place.
pub fn normalize_pct(pct: f64) -> f64 {
    if !pct.is_finite() {
        return 0.0;
    }
    (pct.clamp(0.0, 100.0) * 10.0).round() / 10.0
}

fn default_target_height() -> u32 {
    720
}

/// A user request: a media URL, a target height (0 = audio only) and an optional range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipRequest {
    pub url: String,
    #[serde(default = "default_target_height", alias = "height")]
    pub target_height: u32,
    /// Range start (`SS`, `MM:SS` or `HH:MM:SS`); absent means from the beginning.
    #[serde(default)]
    pub start: Option<String>,
    /// Range end; absent means to the end of the media.
    #[serde(default)]
    pub end: Option<String>,
}

impl ClipRequest {
    pub fn new(url: impl Into<String>, target_height: u32) -> Self {
        Self {
            url: url.into(),
            target_height,
            start: None,
            end: None,
        }
    }

    pub fn with_range(mut self, start: Option<&str>, end: Option<&str>) -> Self {
        self.start = start.map(str::to_string);
        self.end = end.map(str::to_string);
        self
    }

    pub fn is_audio_only(&self) -> bool {
        self.target_height == 0
    }

    /// Start offset, blank strings count as absent.
    pub fn start_offset(&self) -> Option<&str> {
        non_blank(self.start.as_deref())
    }

    /// End offset, blank strings count as absent.
    pub fn end_offset(&self) -> Option<&str> {
        non_blank(self.end.as_deref())
    }

    pub fn has_range(&self) -> bool {
        self.start_offset().is_some() || self.end_offset().is_some()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Snapshot of a registry entry for status listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub listener_attached: bool,
    pub process_running: bool,
}
