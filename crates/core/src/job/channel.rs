//! Per-job progress channel and heartbeat-driven delivery.
//!
//! The sending half is shared by the worker, its progress callbacks and the
//! cancellation path. It enforces the channel invariants itself:
//! - exactly one terminal event is ever enqueued, after which the channel is closed
//! - `pct` never decreases within a job
//! - events after the terminal one are dropped silently
//!
//! The receiving half is handed to exactly one listener. While idle it yields
//! synthetic `ping` events every heartbeat window without touching job state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;

use super::registry::ListenerLease;
use super::types::{JobState, ProgressEvent, ProgressStatus};

/// Creates a connected sender/receiver pair for one job.
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sender = ProgressSender {
        inner: Arc::new(Mutex::new(SenderState {
            tx: Some(tx),
            state: JobState::Pending,
            last_pct: 0.0,
        })),
    };
    let receiver = ProgressReceiver {
        rx,
        finished: false,
        lease: None,
    };
    (sender, receiver)
}

struct SenderState {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
    state: JobState,
    last_pct: f64,
}

/// Producer half of a job's progress channel.
#[derive(Clone)]
pub struct ProgressSender {
    inner: Arc<Mutex<SenderState>>,
}

impl ProgressSender {
    fn lock(&self) -> MutexGuard<'_, SenderState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues an event and applies its state transition.
    ///
    /// Returns `false` when the event was dropped because the job already
    /// reached a terminal state or the channel was closed by teardown.
    pub fn emit(&self, mut event: ProgressEvent) -> bool {
        if event.status == ProgressStatus::Ping {
            return false;
        }

        let mut guard = self.lock();
        if guard.state.is_terminal() {
            return false;
        }
        let Some(tx) = guard.tx.clone() else {
            return false;
        };

        if let Some(pct) = event.pct {
            let pct = pct.max(guard.last_pct);
            guard.last_pct = pct;
            event.pct = Some(pct);
        }
        if let Some(state) = event.status.job_state() {
            guard.state = state;
        }

        let terminal = event.is_terminal();
        // A dropped receiver only means nobody is listening; the transition still counts.
        let _ = tx.send(event);
        if terminal {
            guard.tx = None;
        }
        true
    }

    /// Current job state as seen by the channel.
    pub fn state(&self) -> JobState {
        self.lock().state
    }

    /// Whether no further events can be enqueued.
    pub fn is_closed(&self) -> bool {
        self.lock().tx.is_none()
    }

    /// Closes the channel without a terminal event. Used by teardown only.
    pub fn close(&self) {
        self.lock().tx = None;
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.lock();
        f.debug_struct("ProgressSender")
            .field("state", &guard.state)
            .field("closed", &guard.tx.is_none())
            .finish()
    }
}

/// Consumer half of a job's progress channel.
///
/// A receiver claimed through the registry keeps its job entry alive until
/// it is polled past the terminal event or dropped.
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
    finished: bool,
    lease: Option<ListenerLease>,
}

impl ProgressReceiver {
    pub(crate) fn attach_lease(&mut self, lease: ListenerLease) {
        self.lease = Some(lease);
    }

    /// Waits for the next event, synthesizing a `ping` after `heartbeat` of silence.
    ///
    /// Returns `None` once the terminal event has been delivered or the
    /// channel was closed without one.
    pub async fn next_delivery(&mut self, heartbeat: Duration) -> Option<ProgressEvent> {
        if self.finished {
            self.lease = None;
            return None;
        }

        match tokio::time::timeout(heartbeat, self.rx.recv()).await {
            Err(_) => {
                crate::metrics::PROGRESS_HEARTBEATS.inc();
                Some(ProgressEvent::ping())
            }
            Ok(Some(event)) => {
                if event.is_terminal() {
                    self.finished = true;
                }
                Some(event)
            }
            Ok(None) => {
                self.finished = true;
                self.lease = None;
                None
            }
        }
    }

    /// Whether the terminal event was already delivered.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Turns the receiver into a stream that ends right after the terminal event.
    pub fn into_stream(self, heartbeat: Duration) -> impl Stream<Item = ProgressEvent> + Send {
        futures::stream::unfold(self, move |mut receiver| async move {
            receiver
                .next_delivery(heartbeat)
                .await
                .map(|event| (event, receiver))
        })
    }
}
