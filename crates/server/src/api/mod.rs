pub mod files;
pub mod handlers;
pub mod jobs;
pub mod media;
pub mod middleware;
pub mod progress;
pub mod routes;

pub use routes::create_router;
