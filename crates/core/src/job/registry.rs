//! Process-local store of live jobs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::channel::{progress_channel, ProgressReceiver, ProgressSender};
use super::error::RegistryError;
use super::types::{JobId, JobSummary};

/// Kill switch for the one subprocess a job may be running.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pid: Option<u32>,
    kill_switch: CancellationToken,
}

impl ProcessHandle {
    pub fn new(pid: Option<u32>) -> Self {
        Self {
            pid,
            kill_switch: CancellationToken::new(),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Asks the owning supervisor to kill the subprocess now.
    pub fn kill(&self) {
        self.kill_switch.cancel();
    }

    pub fn is_killed(&self) -> bool {
        self.kill_switch.is_cancelled()
    }

    /// Future that resolves once `kill` has been called.
    pub async fn killed(&self) {
        self.kill_switch.cancelled().await
    }
}

/// What a worker needs to drive one job.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub id: JobId,
    pub progress: ProgressSender,
    pub cancel: CancellationToken,
}

/// Handles the cancellation path needs for one job.
#[derive(Debug, Clone)]
pub(crate) struct CancelTarget {
    pub progress: ProgressSender,
    pub cancel: CancellationToken,
    pub process: Option<ProcessHandle>,
}

type JobMap = HashMap<JobId, JobEntry>;

/// Who holds a job's channel.
#[derive(Debug)]
enum Listener {
    Unclaimed(ProgressReceiver),
    /// Set once the listener drained the terminal event or went away.
    Attached(Arc<AtomicBool>),
}

#[derive(Debug)]
struct JobEntry {
    created_at: DateTime<Utc>,
    progress: ProgressSender,
    listener: Listener,
    cancel: CancellationToken,
    process: Option<ProcessHandle>,
    finished_at: Option<DateTime<Utc>>,
}

impl JobEntry {
    fn worker_done(&self) -> bool {
        self.finished_at.is_some()
    }

    fn listener_released(&self) -> bool {
        match &self.listener {
            Listener::Unclaimed(_) => false,
            Listener::Attached(released) => released.load(Ordering::Acquire),
        }
    }

    fn summary(&self, id: &JobId) -> JobSummary {
        JobSummary {
            id: id.clone(),
            state: self.progress.state(),
            created_at: self.created_at,
            finished_at: self.finished_at,
            listener_attached: matches!(self.listener, Listener::Attached(_))
                && !self.listener_released(),
            process_running: self.process.is_some(),
        }
    }
}

/// Concurrency-safe map from job id to the job's channel, cancellation flag
/// and active process.
///
/// An entry lives until both its worker has torn down and its listener has
/// drained the terminal event or dropped the channel. Entries whose channel
/// is never claimed are dropped by [`JobRegistry::reap_idle`].
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<JobMap>>,
}

/// Held by a claimed [`ProgressReceiver`]; dropping it releases the listener
/// side of the job entry.
#[derive(Debug)]
pub(crate) struct ListenerLease {
    jobs: Weak<RwLock<JobMap>>,
    id: JobId,
    released: Arc<AtomicBool>,
}

impl Drop for ListenerLease {
    fn drop(&mut self) {
        self.released.store(true, Ordering::Release);
        let Some(jobs) = self.jobs.upgrade() else {
            return;
        };
        if let Ok(mut guard) = jobs.try_write() {
            remove_if_worker_done(&mut guard, &self.id);
            return;
        }
        // Lock is busy; finish asynchronously. Without a runtime the reaper
        // picks the entry up.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let id = self.id.clone();
            handle.spawn(async move {
                remove_if_worker_done(&mut *jobs.write().await, &id);
            });
        }
    }
}

fn remove_if_worker_done(jobs: &mut JobMap, id: &JobId) {
    if jobs.get(id).is_some_and(JobEntry::worker_done) {
        jobs.remove(id);
        debug!(job_id = %id, "Job removed after listener released");
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new job in the `pending` state.
    pub async fn create(&self) -> JobContext {
        let id = JobId::new();
        let (progress, receiver) = progress_channel();
        let cancel = CancellationToken::new();

        let entry = JobEntry {
            created_at: Utc::now(),
            progress: progress.clone(),
            listener: Listener::Unclaimed(receiver),
            cancel: cancel.clone(),
            process: None,
            finished_at: None,
        };
        self.jobs.write().await.insert(id.clone(), entry);
        debug!(job_id = %id, "Job registered");

        JobContext {
            id,
            progress,
            cancel,
        }
    }

    /// Hands the job's channel to its single listener.
    pub async fn take_channel(&self, id: &JobId) -> Result<ProgressReceiver, RegistryError> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        let released = Arc::new(AtomicBool::new(false));
        let claimed = Listener::Attached(Arc::clone(&released));
        let mut receiver = match std::mem::replace(&mut entry.listener, claimed) {
            Listener::Unclaimed(receiver) => receiver,
            attached @ Listener::Attached(_) => {
                entry.listener = attached;
                return Err(RegistryError::ListenerAttached(id.clone()));
            }
        };
        receiver.attach_lease(ListenerLease {
            jobs: Arc::downgrade(&self.jobs),
            id: id.clone(),
            released,
        });
        Ok(receiver)
    }

    pub(crate) async fn cancel_target(&self, id: &JobId) -> Result<CancelTarget, RegistryError> {
        let jobs = self.jobs.read().await;
        let entry = jobs
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        Ok(CancelTarget {
            progress: entry.progress.clone(),
            cancel: entry.cancel.clone(),
            process: entry.process.clone(),
        })
    }

    /// Records the job's active subprocess. Returns `false` for unknown ids.
    pub async fn register_process(&self, id: &JobId, handle: ProcessHandle) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(entry) = jobs.get_mut(id) else {
            return false;
        };
        if let Some(previous) = entry.process.replace(handle) {
            warn!(job_id = %id, pid = ?previous.pid(), "Replacing a still registered process");
            previous.kill();
        }
        true
    }

    pub async fn unregister_process(&self, id: &JobId) -> Option<ProcessHandle> {
        let mut jobs = self.jobs.write().await;
        jobs.get_mut(id).and_then(|entry| entry.process.take())
    }

    /// Releases the job's resources once its worker is finished.
    ///
    /// Idempotent. The entry is removed right away when the listener already
    /// released the channel. While a listener still holds it, removal waits
    /// for the listener to drain the terminal event or drop the receiver. An
    /// unclaimed channel stays claimable until the idle reaper drops it.
    pub async fn teardown(&self, id: &JobId) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(entry) = jobs.get_mut(id) else {
            return false;
        };
        if entry.worker_done() {
            return false;
        }

        entry.finished_at = Some(Utc::now());
        entry.process = None;
        entry.progress.close();

        if entry.listener_released() {
            jobs.remove(id);
            debug!(job_id = %id, "Job removed from registry");
        } else if matches!(entry.listener, Listener::Attached(_)) {
            debug!(job_id = %id, "Job finished, waiting for listener to drain");
        } else {
            debug!(job_id = %id, "Job finished before a listener attached");
        }
        true
    }

    /// Drops finished entries whose channel was never claimed within `max_age`,
    /// plus finished entries whose listener already released the channel.
    pub async fn reap_idle(&self, max_age: Duration) -> usize {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|id, entry| {
            let Some(finished_at) = entry.finished_at else {
                return true;
            };
            match &entry.listener {
                Listener::Unclaimed(_) if now - finished_at >= max_age => {
                    debug!(job_id = %id, "Reaping unclaimed job");
                    false
                }
                Listener::Attached(_) if entry.listener_released() => {
                    debug!(job_id = %id, "Reaping released job");
                    false
                }
                _ => true,
            }
        });
        before - jobs.len()
    }

    pub async fn get(&self, id: &JobId) -> Option<JobSummary> {
        self.jobs.read().await.get(id).map(|entry| entry.summary(id))
    }

    /// Snapshot of all live jobs, oldest first.
    pub async fn list(&self) -> Vec<JobSummary> {
        let jobs = self.jobs.read().await;
        let mut summaries: Vec<_> = jobs.iter().map(|(id, entry)| entry.summary(id)).collect();
        summaries.sort_by_key(|s| s.created_at);
        summaries
    }

    pub async fn contains(&self, id: &JobId) -> bool {
        self.jobs.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
