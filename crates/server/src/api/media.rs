//! Media info handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use ytcut_core::{worker::seconds_to_hms, QualityOption};

use super::handlers::ErrorResponse;
use crate::state::AppState;

/// Request body for media info
#[derive(Debug, Deserialize)]
pub struct MediaInfoBody {
    #[serde(default)]
    pub url: String,
}

/// Metadata and selectable qualities for a URL
#[derive(Debug, Serialize)]
pub struct MediaInfoResponse {
    pub title: String,
    pub thumbnail: Option<String>,
    /// Duration in seconds
    pub duration: f64,
    pub duration_str: String,
    pub channel: Option<String>,
    pub formats: Vec<QualityOption>,
}

/// Resolve a URL without downloading anything
pub async fn media_info(
    State(state): State<Arc<AppState>>,
    Json(body): Json<MediaInfoBody>,
) -> Result<Json<MediaInfoResponse>, impl IntoResponse> {
    let url = body.url.trim();
    if url.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("No URL provided")),
        ));
    }

    match state.resolver().resolve(url, None).await {
        Ok(info) => Ok(Json(MediaInfoResponse {
            formats: info.quality_options(),
            duration_str: seconds_to_hms(info.duration_secs),
            duration: info.duration_secs,
            title: info.title,
            thumbnail: info.thumbnail,
            channel: info.uploader,
        })),
        Err(e) => {
            warn!(url = %url, "Media info failed: {}", e);
            Err((StatusCode::BAD_REQUEST, Json(ErrorResponse::new(e.to_string()))))
        }
    }
}
