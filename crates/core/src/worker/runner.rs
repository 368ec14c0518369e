//! The per-job worker.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clipper::{ClipInput, ClipMode, ClipOutcome, ClipSpec, ClipSupervisor};
use crate::job::{ClipRequest, JobContext, JobError, JobId, JobRegistry, ProgressEvent};
use crate::metrics;
use crate::resolver::{
    DownloadProgress, DownloadRequest, DownloadStatus, MediaResolver, PostProcess,
    ProgressControl, ResolverError,
};

use super::output::{finalize_output, TempFiles};
use super::strategy::Strategy;
use super::timecode::{parse_time, ClipWindow};

/// Filesystem and encoding settings shared by all workers.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub downloads_dir: PathBuf,
    pub temp_prefix: String,
    pub audio_bitrate_kbps: u32,
}

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Done,
    Error,
    Cancelled,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug)]
struct Completed {
    filename: String,
    title: String,
}

/// Drives one job from request to terminal event.
#[derive(Clone)]
pub struct JobWorker {
    registry: Arc<JobRegistry>,
    resolver: Arc<dyn MediaResolver>,
    supervisor: ClipSupervisor,
    settings: WorkerSettings,
}

impl JobWorker {
    pub fn new(
        registry: Arc<JobRegistry>,
        resolver: Arc<dyn MediaResolver>,
        supervisor: ClipSupervisor,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            registry,
            resolver,
            supervisor,
            settings,
        }
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// Runs the job on its own task.
    ///
    /// Teardown (temp file removal, process unregistration, registry
    /// release) runs exactly once after the job ends, including when the
    /// job task panics.
    pub fn spawn(&self, ctx: JobContext, request: ClipRequest) -> JoinHandle<JobOutcome> {
        let worker = self.clone();
        tokio::spawn(async move {
            let id = ctx.id.clone();
            let progress = ctx.progress.clone();
            let temp = TempFiles::new(
                &worker.settings.downloads_dir,
                &worker.settings.temp_prefix,
                uuid::Uuid::new_v4().to_string(),
            );

            let job = {
                let worker = worker.clone();
                let temp = temp.clone();
                tokio::spawn(async move { worker.run(ctx, request, &temp).await })
            };

            let outcome = match job.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(job_id = %id, "Job task aborted: {}", e);
                    progress.emit(ProgressEvent::error("internal error while processing the job"));
                    metrics::JOBS_FINISHED.with_label_values(&["error"]).inc();
                    JobOutcome::Error
                }
            };

            worker.teardown(&id, &temp).await;
            outcome
        })
    }

    async fn teardown(&self, id: &JobId, temp: &TempFiles) {
        temp.cleanup().await;
        self.registry.unregister_process(id).await;
        self.registry.teardown(id).await;
        debug!(job_id = %id, "Job torn down");
    }

    async fn run(&self, ctx: JobContext, request: ClipRequest, temp: &TempFiles) -> JobOutcome {
        let strategy = Strategy::select(&request);
        let started = Instant::now();
        info!(job_id = %ctx.id, strategy = strategy.label(), url = %request.url, "Job started");

        let result = if strategy.is_clip() {
            self.run_clip(&ctx, &request, strategy, temp).await
        } else {
            self.run_full(&ctx, &request, strategy, temp).await
        };

        let outcome = match result {
            Ok(_) if ctx.cancel.is_cancelled() => JobOutcome::Cancelled,
            Ok(done) => {
                if ctx.progress.emit(ProgressEvent::done(&done.filename, &done.title)) {
                    info!(job_id = %ctx.id, filename = %done.filename, "Job done");
                    JobOutcome::Done
                } else {
                    JobOutcome::Cancelled
                }
            }
            Err(e) if ctx.cancel.is_cancelled() || e.is_cancellation() => {
                debug!(job_id = %ctx.id, "Job stopped after cancellation: {}", e);
                ctx.progress.emit(ProgressEvent::cancelled());
                JobOutcome::Cancelled
            }
            Err(e) => {
                warn!(job_id = %ctx.id, "Job failed: {}", e);
                ctx.progress.emit(ProgressEvent::error(e.to_string()));
                JobOutcome::Error
            }
        };

        metrics::JOBS_FINISHED
            .with_label_values(&[outcome.as_str()])
            .inc();
        metrics::JOB_DURATION
            .with_label_values(&[strategy.label()])
            .observe(started.elapsed().as_secs_f64());
        outcome
    }

    async fn run_full(
        &self,
        ctx: &JobContext,
        request: &ClipRequest,
        strategy: Strategy,
        temp: &TempFiles,
    ) -> Result<Completed, JobError> {
        let post_process = if strategy.is_audio() {
            PostProcess::ExtractMp3 {
                bitrate_kbps: self.settings.audio_bitrate_kbps,
            }
        } else {
            PostProcess::MergeMp4
        };
        let download = DownloadRequest {
            url: request.url.clone(),
            format_selector: strategy.format_selector(),
            output_template: temp.template(),
            post_process,
            cancel: ctx.cancel.clone(),
        };

        let tracker = DownloadTracker::new(strategy.download_streams());
        let on_progress = |p: DownloadProgress| -> ProgressControl {
            if ctx.cancel.is_cancelled() {
                return ProgressControl::Cancel;
            }
            if let Some(event) = tracker.translate(p) {
                ctx.progress.emit(event);
            }
            ProgressControl::Continue
        };

        let outcome = self.resolver.download(&download, &on_progress).await?;
        if ctx.cancel.is_cancelled() {
            return Err(JobError::CancellationRequested);
        }
        if let Some(event) = tracker.complete() {
            ctx.progress.emit(event);
        }

        let ext = strategy.extension();
        let produced = match outcome.file_path {
            Some(path) if tokio::fs::try_exists(&path).await.unwrap_or(false) => path,
            _ => temp.locate(ext).await?,
        };
        let produced_ext = produced
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| ext.to_string());

        let filename = finalize_output(&produced, temp.dir(), &outcome.title, &produced_ext).await?;
        Ok(Completed {
            filename,
            title: outcome.title,
        })
    }

    async fn run_clip(
        &self,
        ctx: &JobContext,
        request: &ClipRequest,
        strategy: Strategy,
        temp: &TempFiles,
    ) -> Result<Completed, JobError> {
        let start_secs = request.start_offset().map(parse_time).transpose()?;
        let end_secs = request.end_offset().map(parse_time).transpose()?;

        let selector = strategy.format_selector();
        let info = self.resolver.resolve(&request.url, Some(&selector)).await?;
        if ctx.cancel.is_cancelled() {
            return Err(JobError::CancellationRequested);
        }

        let window = ClipWindow::from_bounds(start_secs, end_secs, info.duration_secs);
        let streams = match strategy {
            Strategy::ClipAudio => &info.streams[..info.streams.len().min(1)],
            _ => &info.streams[..info.streams.len().min(2)],
        };
        if streams.is_empty() {
            return Err(ResolverError::failed("no direct stream URL for the requested format").into());
        }

        let ext = strategy.extension();
        let mode = if strategy.is_audio() {
            ClipMode::Audio {
                bitrate_kbps: self.settings.audio_bitrate_kbps,
            }
        } else {
            ClipMode::StreamCopy
        };
        let spec = ClipSpec {
            inputs: streams.iter().map(|s| ClipInput::new(&s.url)).collect(),
            start_secs: window.start_secs,
            duration_secs: window.duration_secs,
            mode,
            output: temp.path_with_extension(ext),
            user_agent: streams[0].user_agent().map(str::to_string),
        };

        ctx.progress.emit(ProgressEvent::cutting(0.0));
        debug!(
            job_id = %ctx.id,
            start = window.start_secs,
            duration = window.duration_secs,
            inputs = spec.inputs.len(),
            "Starting clip"
        );

        let running = self.supervisor.spawn(&spec)?;
        self.registry.register_process(&ctx.id, running.handle()).await;

        let progress = ctx.progress.clone();
        let result = running
            .supervise(&ctx.cancel, |p| {
                progress.emit(
                    ProgressEvent::cutting(p.pct)
                        .with_speed(p.speed)
                        .with_bytes(p.downloaded_bytes, None),
                );
            })
            .await;
        self.registry.unregister_process(&ctx.id).await;

        match result? {
            ClipOutcome::Cancelled => return Err(JobError::CancellationRequested),
            ClipOutcome::Completed => {}
        }
        if ctx.cancel.is_cancelled() {
            return Err(JobError::CancellationRequested);
        }

        let produced = temp.locate(ext).await?;
        let filename = finalize_output(&produced, temp.dir(), &info.title, ext).await?;
        Ok(Completed {
            filename,
            title: info.title,
        })
    }
}

/// Turns resolver reports for a full download into job events.
///
/// Streams are fetched one after the other, each reporting its own 0-100,
/// so the job percentage splits the range evenly between them. `processing`
/// goes out once: when the resolver starts post-processing, when the last
/// expected stream finishes, or when the download returns.
#[derive(Debug)]
struct DownloadTracker {
    streams: u32,
    finished: AtomicU32,
    processing_sent: AtomicBool,
}

impl DownloadTracker {
    fn new(streams: u32) -> Self {
        Self {
            streams: streams.max(1),
            finished: AtomicU32::new(0),
            processing_sent: AtomicBool::new(false),
        }
    }

    fn overall_pct(&self, finished: u32, stream_pct: f64) -> f64 {
        let done = f64::from(finished.min(self.streams));
        ((done * 100.0 + stream_pct.clamp(0.0, 100.0)) / f64::from(self.streams)).min(100.0)
    }

    fn translate(&self, p: DownloadProgress) -> Option<ProgressEvent> {
        if self.processing_sent.load(Ordering::SeqCst) {
            return None;
        }
        match p.status {
            DownloadStatus::Downloading => {
                let finished = self.finished.load(Ordering::SeqCst);
                let pct = self.overall_pct(finished, p.percent.unwrap_or(0.0));
                Some(
                    ProgressEvent::downloading(pct)
                        .with_speed(p.speed)
                        .with_eta(p.eta)
                        .with_bytes(p.downloaded_bytes, p.total_bytes),
                )
            }
            DownloadStatus::Finished => {
                let finished = self.finished.fetch_add(1, Ordering::SeqCst) + 1;
                if finished >= self.streams {
                    self.complete()
                } else {
                    Some(ProgressEvent::downloading(self.overall_pct(finished, 0.0)))
                }
            }
            DownloadStatus::PostProcessing => self.complete(),
        }
    }

    /// The `processing` event, unless it already went out.
    fn complete(&self) -> Option<ProgressEvent> {
        if self.processing_sent.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(ProgressEvent::processing())
        }
    }
}

impl std::fmt::Debug for JobWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobWorker")
            .field("resolver", &self.resolver.name())
            .field("settings", &self.settings)
            .finish()
    }
}
