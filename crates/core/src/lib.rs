pub mod clipper;
pub mod config;
pub mod job;
pub mod metrics;
pub mod orchestrator;
pub mod resolver;
pub mod testing;
pub mod worker;

pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use job::{
    CancelOutcome, ClipRequest, JobError, JobId, JobState, JobSummary, ProgressEvent,
    ProgressReceiver, ProgressStatus,
};
pub use orchestrator::{JobOrchestrator, OrchestratorConfig, OrchestratorError, OrchestratorStatus};
pub use resolver::{MediaInfo, MediaResolver, QualityOption, ResolverError, YtDlpResolver};
