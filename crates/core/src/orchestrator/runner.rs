//! Job orchestrator implementation.
//!
//! Owns the registry and wires the per-job pieces together:
//! - Creation: allocate the job, spawn its worker
//! - Delivery: hand the job's channel to exactly one listener
//! - Cancellation: forwarded to the coordinator
//! - Reaping: background loop dropping finished jobs nobody listened to

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::clipper::{ClipSupervisor, ClipperConfig};
use crate::job::{
    CancelOutcome, CancellationCoordinator, ClipRequest, JobId, JobRegistry, JobSummary,
    ProgressReceiver,
};
use crate::metrics;
use crate::resolver::MediaResolver;
use crate::worker::{JobWorker, WorkerSettings};

use super::config::OrchestratorConfig;
use super::types::{OrchestratorError, OrchestratorStatus};

/// The job orchestrator - entry point for creating, streaming and cancelling jobs.
pub struct JobOrchestrator {
    config: OrchestratorConfig,
    registry: Arc<JobRegistry>,
    worker: JobWorker,
    coordinator: CancellationCoordinator,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl JobOrchestrator {
    /// Create a new orchestrator writing finished files to `downloads_dir`.
    pub fn new(
        config: OrchestratorConfig,
        resolver: Arc<dyn MediaResolver>,
        clipper: ClipperConfig,
        downloads_dir: impl Into<PathBuf>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let registry = Arc::new(JobRegistry::new());

        let settings = WorkerSettings {
            downloads_dir: downloads_dir.into(),
            temp_prefix: config.temp_prefix.clone(),
            audio_bitrate_kbps: clipper.audio_bitrate_kbps,
        };
        let worker = JobWorker::new(
            Arc::clone(&registry),
            resolver,
            ClipSupervisor::new(clipper),
            settings,
        );
        let coordinator = CancellationCoordinator::new(Arc::clone(&registry));

        Self {
            config,
            registry,
            worker,
            coordinator,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// The registry shared with workers and the coordinator.
    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Heartbeat window for progress listeners.
    pub fn heartbeat(&self) -> Duration {
        self.config.heartbeat()
    }

    /// Allocates a job and starts its worker. Returns immediately.
    pub async fn create_job(&self, request: ClipRequest) -> Result<JobId, OrchestratorError> {
        if request.url.trim().is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "no URL provided".to_string(),
            ));
        }

        let ctx = self.registry.create().await;
        let id = ctx.id.clone();
        metrics::JOBS_CREATED.inc();
        info!(
            job_id = %id,
            height = request.target_height,
            clip = request.has_range(),
            "Job created"
        );

        // The worker owns teardown; its handle is not needed here.
        let _ = self.worker.spawn(ctx, request);
        Ok(id)
    }

    /// Claims the job's progress channel. Only one listener per job.
    pub async fn subscribe(&self, id: &JobId) -> Result<ProgressReceiver, OrchestratorError> {
        let receiver = self.registry.take_channel(id).await?;
        debug!(job_id = %id, "Progress listener attached");
        Ok(receiver)
    }

    /// Cancels a job: flag, kill, forced `cancelled` event.
    pub async fn cancel(&self, id: &JobId) -> Result<CancelOutcome, OrchestratorError> {
        Ok(self.coordinator.request_cancel(id).await?)
    }

    pub async fn get(&self, id: &JobId) -> Result<JobSummary, OrchestratorError> {
        self.registry
            .get(id)
            .await
            .ok_or_else(|| OrchestratorError::JobNotFound(id.clone()))
    }

    pub async fn list(&self) -> Vec<JobSummary> {
        self.registry.list().await
    }

    /// Get current orchestrator status.
    pub async fn status(&self) -> OrchestratorStatus {
        let jobs = self.registry.list().await;

        OrchestratorStatus {
            running: self.running.load(Ordering::Relaxed),
            total_jobs: jobs.len(),
            active_jobs: jobs.iter().filter(|j| !j.state.is_terminal()).count(),
            listeners_attached: jobs.iter().filter(|j| j.listener_attached).count(),
            processes_running: jobs.iter().filter(|j| j.process_running).count(),
        }
    }

    /// Drops finished jobs whose channel was never claimed in time.
    pub async fn reap_idle(&self) -> usize {
        Self::reap(&self.registry, self.config.idle_timeout()).await
    }

    async fn reap(registry: &JobRegistry, idle_timeout: Duration) -> usize {
        let reaped = registry.reap_idle(idle_timeout).await;
        if reaped > 0 {
            info!("Reaped {} unclaimed job(s)", reaped);
        }
        reaped
    }

    /// Start the orchestrator (spawns background tasks).
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return;
        }

        info!("Starting job orchestrator");
        self.spawn_reaper_loop();
        info!("Job orchestrator started");
    }

    /// Stop the orchestrator gracefully.
    ///
    /// Running jobs are cancelled so their processes are killed and temp
    /// files removed.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Orchestrator not running");
            return;
        }

        info!("Stopping job orchestrator");

        // Signal shutdown to the background loops
        let _ = self.shutdown_tx.send(());

        for job in self.registry.list().await {
            if !job.state.is_terminal() {
                if let Err(e) = self.coordinator.request_cancel(&job.id).await {
                    debug!(job_id = %job.id, "Cancel on shutdown skipped: {}", e);
                }
            }
        }

        // Give workers a moment to finish teardown
        tokio::time::sleep(Duration::from_millis(500)).await;

        info!("Job orchestrator stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    fn spawn_reaper_loop(&self) {
        let running = Arc::clone(&self.running);
        let registry = Arc::clone(&self.registry);
        let interval = self.config.reap_interval();
        let idle_timeout = self.config.idle_timeout();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Reaper loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Reaper loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        Self::reap(&registry, idle_timeout).await;
                    }
                }
            }
            info!("Reaper loop stopped");
        });
    }
}

impl std::fmt::Debug for JobOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobOrchestrator")
            .field("config", &self.config)
            .field("worker", &self.worker)
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish()
    }
}
