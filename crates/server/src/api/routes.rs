use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use super::{files, handlers, jobs, media, middleware::metrics_middleware, progress};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let static_dir = state.config().server.static_dir.clone();

    // API routes
    let api_routes = Router::new()
        // Health, config and status
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/status", get(handlers::get_status))
        // Media info
        .route("/info", post(media::media_info))
        // Jobs
        .route("/jobs", post(jobs::create_job).get(jobs::list_jobs))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/jobs/{id}/progress", get(progress::stream_progress))
        .route("/jobs/{id}/cancel", post(jobs::cancel_job))
        .with_state(state.clone());

    // Root aliases of the job routes above. Same handlers and payloads, so
    // clients read the camelCase progress fields (`outputFilename`,
    // `downloadedBytes`, `totalBytes`) and the `cutting` status.
    let ui_routes = Router::new()
        .route("/info", post(media::media_info))
        .route("/download", post(jobs::create_job))
        .route("/progress/{id}", get(progress::stream_progress))
        .route("/cancel/{id}", post(jobs::cancel_job))
        .route("/downloads/{filename}", get(files::download_file))
        .route("/metrics", get(handlers::metrics))
        .with_state(state);

    // Serve the UI with SPA fallback
    let index_path = static_dir.join("index.html");
    let serve_dir = ServeDir::new(&static_dir).fallback(ServeFile::new(index_path));

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(ui_routes)
        .fallback_service(serve_dir)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
