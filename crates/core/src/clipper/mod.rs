//! Clip process supervision.
//!
//! Builds the ffmpeg invocation that seeks and cuts remote streams, parses
//! its `-progress` output and kills it on cancellation.

mod command;
mod config;
mod error;
mod progress;
mod supervisor;

pub use command::{ClipCommand, ClipInput, ClipMode, ClipSpec};
pub use config::ClipperConfig;
pub use error::ClipperError;
pub use progress::{clip_pct, ClipProgress, ProgressParser, MAX_CLIP_PCT};
pub use supervisor::{ClipOutcome, ClipSupervisor, RunningClip};
