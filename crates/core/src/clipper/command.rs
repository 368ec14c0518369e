//! Argument builder for the clipping tool.

use std::path::{Path, PathBuf};

/// One remote input, seeked server side.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipInput {
    pub url: String,
}

impl ClipInput {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Codec handling for the clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClipMode {
    /// Copy streams without re-encoding. Two inputs are mapped video + audio.
    StreamCopy,
    /// Drop video, encode audio to MP3 at a fixed bitrate.
    Audio { bitrate_kbps: u32 },
}

/// Everything one clip invocation needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipSpec {
    /// One combined input, or video-only followed by audio-only.
    pub inputs: Vec<ClipInput>,
    pub start_secs: f64,
    pub duration_secs: f64,
    pub mode: ClipMode,
    pub output: PathBuf,
    pub user_agent: Option<String>,
}

/// Builder for a clip invocation of ffmpeg.
#[derive(Debug, Clone)]
pub struct ClipCommand<'a> {
    spec: &'a ClipSpec,
    log_level: String,
}

impl<'a> ClipCommand<'a> {
    pub fn new(spec: &'a ClipSpec) -> Self {
        Self {
            spec,
            log_level: "error".to_string(),
        }
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn output(&self) -> &Path {
        &self.spec.output
    }

    /// Builds the argument list.
    ///
    /// Progress goes to stdout as `key=value` records; stats on stderr are
    /// suppressed so stderr only carries diagnostics.
    pub fn build_args(&self) -> Vec<String> {
        let spec = self.spec;
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            self.log_level.clone(),
        ];

        // Input options bind to the next `-i` only, so each input gets its own.
        let user_agent = spec.user_agent.as_deref().filter(|ua| !ua.is_empty());
        let start = format_secs(spec.start_secs);
        for input in &spec.inputs {
            if let Some(ua) = user_agent {
                args.push("-user_agent".into());
                args.push(ua.to_string());
            }
            args.push("-ss".into());
            args.push(start.clone());
            args.push("-i".into());
            args.push(input.url.clone());
        }

        args.push("-t".into());
        args.push(format_secs(spec.duration_secs));

        match spec.mode {
            ClipMode::StreamCopy => {
                if spec.inputs.len() > 1 {
                    args.extend(["-map", "0:v:0", "-map", "1:a:0"].map(String::from));
                }
                args.extend(["-c", "copy"].map(String::from));
            }
            ClipMode::Audio { bitrate_kbps } => {
                args.extend(["-vn", "-c:a", "libmp3lame", "-b:a"].map(String::from));
                args.push(format!("{}k", bitrate_kbps));
            }
        }

        args.extend(["-progress", "pipe:1", "-nostats"].map(String::from));
        args.push(spec.output.to_string_lossy().into_owned());
        args
    }
}

fn format_secs(secs: f64) -> String {
    format!("{:.3}", secs.max(0.0))
}
