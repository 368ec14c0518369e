//! Per-job progress stream (Server-Sent Events).
//!
//! Each event goes out as `data: <json>\n\n`. A `ping` is sent whenever the
//! job stays silent for the heartbeat window, and the stream ends right
//! after the job's terminal event.

use axum::{
    extract::{Path, State},
    http::{HeaderName, HeaderValue},
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::debug;
use ytcut_core::{JobId, ProgressEvent};

use super::jobs::error_response;
use crate::metrics::{PROGRESS_EVENTS_SENT, PROGRESS_STREAMS_ACTIVE, PROGRESS_STREAMS_TOTAL};
use crate::state::AppState;

/// Keeps the open-streams gauge accurate however the stream ends.
struct StreamGuard {
    job_id: JobId,
}

impl StreamGuard {
    fn open(job_id: JobId) -> Self {
        PROGRESS_STREAMS_ACTIVE.inc();
        PROGRESS_STREAMS_TOTAL.inc();
        Self { job_id }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        PROGRESS_STREAMS_ACTIVE.dec();
        debug!(job_id = %self.job_id, "Progress stream closed");
    }
}

fn to_event(event: &ProgressEvent) -> Event {
    Event::default().data(event.sse_data())
}

/// Stream a job's progress events until its terminal event
pub async fn stream_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let job_id = JobId::from(id);
    let orchestrator = state.orchestrator();

    let mut receiver = match orchestrator.subscribe(&job_id).await {
        Ok(receiver) => receiver,
        Err(e) => return error_response(e).into_response(),
    };
    let heartbeat = orchestrator.heartbeat();
    let guard = StreamGuard::open(job_id);

    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(event) = receiver.next_delivery(heartbeat).await {
            PROGRESS_EVENTS_SENT
                .with_label_values(&[event.status.as_str()])
                .inc();
            yield Ok::<Event, Infallible>(to_event(&event));
        }
    };

    (
        [(
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        )],
        Sse::new(stream),
    )
        .into_response()
}
