//! Configuration for the clip process supervisor.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the ffmpeg-based clipper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipperConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Bitrate for audio clips, in kbit/s.
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate_kbps: u32,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Number of stderr lines kept for error reports.
    #[serde(default = "default_stderr_tail")]
    pub stderr_tail_lines: usize,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_audio_bitrate() -> u32 {
    192
}

fn default_log_level() -> String {
    "error".to_string()
}

fn default_stderr_tail() -> usize {
    20
}

impl Default for ClipperConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            audio_bitrate_kbps: default_audio_bitrate(),
            log_level: default_log_level(),
            stderr_tail_lines: default_stderr_tail(),
        }
    }
}
