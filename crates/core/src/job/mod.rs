//! Jobs: identifiers, progress events, the per-job channel, the registry and
//! the cancellation path.

mod cancel;
mod channel;
mod error;
mod registry;
mod types;

pub use cancel::{CancelOutcome, CancellationCoordinator};
pub use channel::{progress_channel, ProgressReceiver, ProgressSender};
pub use error::{JobError, RegistryError};
pub use registry::{JobContext, JobRegistry, ProcessHandle};
pub use types::{
    normalize_pct, ClipRequest, JobId, JobState, JobSummary, ProgressEvent, ProgressStatus,
};
