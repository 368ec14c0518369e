//! Media resolution: metadata, direct stream URLs and full downloads.

mod config;
mod error;
mod traits;
mod types;
mod ytdlp;

pub use config::ResolverConfig;
pub use error::ResolverError;
pub use traits::{MediaResolver, ProgressCallback};
pub use types::{
    DownloadOutcome, DownloadProgress, DownloadRequest, DownloadStatus, MediaFormat, MediaInfo,
    PostProcess, ProgressControl, QualityOption, StreamDescriptor, AUDIO_ONLY_LABEL,
};
pub use ytdlp::{parse_info_json, parse_progress_line, strip_ansi, YtDlpResolver};
