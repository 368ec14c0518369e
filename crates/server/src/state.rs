use std::path::Path;
use std::sync::Arc;
use ytcut_core::{Config, JobOrchestrator, MediaResolver};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<JobOrchestrator>,
    resolver: Arc<dyn MediaResolver>,
}

impl AppState {
    pub fn new(
        config: Config,
        orchestrator: Arc<JobOrchestrator>,
        resolver: Arc<dyn MediaResolver>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            resolver,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &JobOrchestrator {
        self.orchestrator.as_ref()
    }

    pub fn resolver(&self) -> &dyn MediaResolver {
        self.resolver.as_ref()
    }

    /// Where finished files are served from.
    pub fn downloads_dir(&self) -> &Path {
        &self.config.downloads.dir
    }
}
