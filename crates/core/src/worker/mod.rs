//! The per-job worker and the pieces it is built from.
//!
//! - `timecode`: time strings and clip windows
//! - `strategy`: full/clip, video/audio selection
//! - `output`: temp files, title sanitizing, final rename
//! - `runner`: the task that drives one job to its terminal event

mod output;
mod runner;
mod strategy;
mod timecode;

pub use output::{finalize_output, sanitize_title, TempFiles, MAX_TITLE_CHARS};
pub use runner::{JobOutcome, JobWorker, WorkerSettings};
pub use strategy::{video_selector, Strategy, AUDIO_SELECTOR};
pub use timecode::{
    clip_window, parse_time, seconds_to_hms, ClipWindow, TimecodeError, MIN_CLIP_SECS,
};
