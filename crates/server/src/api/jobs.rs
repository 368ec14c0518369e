//! Job API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use ytcut_core::{ClipRequest, JobId, JobSummary, OrchestratorError};

use super::handlers::ErrorResponse;
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

/// Response for job creation
#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: JobId,
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobSummary>,
    pub total: usize,
}

/// Response for a cancel request
#[derive(Debug, Serialize)]
pub struct CancelJobResponse {
    pub job_id: JobId,
    /// `false` when the job had already ended.
    pub cancelled: bool,
    /// A running clip process was killed.
    pub process_killed: bool,
}

/// Maps orchestrator errors to HTTP responses.
pub(crate) fn error_response(err: OrchestratorError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        OrchestratorError::JobNotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::ListenerAttached(_) => StatusCode::CONFLICT,
        OrchestratorError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
    };
    (status, Json(ErrorResponse::new(err.to_string())))
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a job and start it in the background
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ClipRequest>,
) -> Result<(StatusCode, Json<CreateJobResponse>), impl IntoResponse> {
    match state.orchestrator().create_job(request).await {
        Ok(job_id) => Ok((StatusCode::CREATED, Json(CreateJobResponse { job_id }))),
        Err(e) => Err(error_response(e)),
    }
}

/// List jobs held by the registry
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<ListJobsResponse> {
    let jobs = state.orchestrator().list().await;
    Json(ListJobsResponse {
        total: jobs.len(),
        jobs,
    })
}

/// Get a job by ID
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobSummary>, impl IntoResponse> {
    state
        .orchestrator()
        .get(&JobId::from(id))
        .await
        .map(Json)
        .map_err(error_response)
}

/// Cancel a job
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CancelJobResponse>, impl IntoResponse> {
    let job_id = JobId::from(id);
    match state.orchestrator().cancel(&job_id).await {
        Ok(outcome) => {
            info!(job_id = %job_id, "Job cancelled via API");
            Ok(Json(CancelJobResponse {
                job_id,
                cancelled: outcome.event_emitted,
                process_killed: outcome.process_killed,
            }))
        }
        Err(e) => Err(error_response(e)),
    }
}
