//! Retrieval strategy selection.

use crate::job::ClipRequest;

pub const AUDIO_SELECTOR: &str = "bestaudio/best";

/// Format selector for video capped at `height`, preferring MP4/M4A pairs.
pub fn video_selector(height: u32) -> String {
    format!(
        "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/bestvideo[height<={h}]+bestaudio/best[height<={h}]",
        h = height
    )
}

/// How a job retrieves its media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Whole asset through the resolver, merged to MP4.
    FullVideo { height: u32 },
    /// Whole asset through the resolver, extracted to MP3.
    FullAudio,
    /// Seek and cut remote streams, stream copy.
    ClipVideo { height: u32 },
    /// Seek and cut the remote audio stream, encoded to MP3.
    ClipAudio,
}

impl Strategy {
    /// Picks the strategy from `(target_height == 0, has_range)`.
    pub fn select(request: &ClipRequest) -> Self {
        let height = request.target_height;
        match (request.is_audio_only(), request.has_range()) {
            (true, false) => Self::FullAudio,
            (true, true) => Self::ClipAudio,
            (false, false) => Self::FullVideo { height },
            (false, true) => Self::ClipVideo { height },
        }
    }

    pub fn is_clip(&self) -> bool {
        matches!(self, Self::ClipVideo { .. } | Self::ClipAudio)
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::FullAudio | Self::ClipAudio)
    }

    pub fn format_selector(&self) -> String {
        match self {
            Self::FullVideo { height } | Self::ClipVideo { height } => video_selector(*height),
            Self::FullAudio | Self::ClipAudio => AUDIO_SELECTOR.to_string(),
        }
    }

    /// Streams a full download is expected to fetch one after the other:
    /// video and audio for the merging selector, one otherwise.
    pub fn download_streams(&self) -> u32 {
        match self {
            Self::FullVideo { .. } => 2,
            _ => 1,
        }
    }

    /// Extension of the produced file.
    pub fn extension(&self) -> &'static str {
        if self.is_audio() {
            "mp3"
        } else {
            "mp4"
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::FullVideo { .. } => "full_video",
            Self::FullAudio => "full_audio",
            Self::ClipVideo { .. } => "clip_video",
            Self::ClipAudio => "clip_audio",
        }
    }
}
