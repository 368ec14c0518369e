//! Types for media resolution and downloads.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Metadata for one media URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub title: String,
    pub duration_secs: f64,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub formats: Vec<MediaFormat>,
    /// Direct media URLs for the requested selector, in input order
    /// (video first when video and audio are separate).
    #[serde(default)]
    pub streams: Vec<StreamDescriptor>,
}

/// One format offered by the source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaFormat {
    #[serde(default)]
    pub format_id: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub video_codec: Option<String>,
    #[serde(default)]
    pub audio_codec: Option<String>,
    #[serde(default)]
    pub filesize_bytes: Option<u64>,
}

impl MediaFormat {
    /// Carries a video track.
    pub fn has_video(&self) -> bool {
        self.video_codec.as_deref().is_some_and(|c| c != "none")
    }
}

/// A direct stream URL plus the headers the CDN expects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub url: String,
    #[serde(default)]
    pub http_headers: HashMap<String, String>,
}

impl StreamDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http_headers: HashMap::new(),
        }
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.http_headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("user-agent"))
            .map(|(_, v)| v.as_str())
    }
}

/// A selectable output quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityOption {
    pub label: String,
    /// Target height; 0 means audio only.
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesize_bytes: Option<u64>,
}

pub const AUDIO_ONLY_LABEL: &str = "Audio only (MP3)";

impl MediaInfo {
    /// Unique video heights, tallest first, followed by the audio-only option.
    pub fn quality_options(&self) -> Vec<QualityOption> {
        let mut by_height: BTreeMap<u32, Option<u64>> = BTreeMap::new();
        for format in self.formats.iter().filter(|f| f.has_video()) {
            let Some(height) = format.height.filter(|h| *h > 0) else {
                continue;
            };
            let size = by_height.entry(height).or_insert(None);
            *size = match (*size, format.filesize_bytes) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
        }

        let mut options: Vec<QualityOption> = by_height
            .into_iter()
            .rev()
            .map(|(height, filesize_bytes)| QualityOption {
                label: format!("{}p", height),
                height,
                filesize_bytes,
            })
            .collect();
        options.push(QualityOption {
            label: AUDIO_ONLY_LABEL.to_string(),
            height: 0,
            filesize_bytes: None,
        });
        options
    }
}

/// Post-processing applied after the bytes are retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PostProcess {
    /// Merge separate video and audio into an MP4 container.
    MergeMp4,
    /// Extract the audio track as MP3.
    ExtractMp3 { bitrate_kbps: u32 },
}

impl PostProcess {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::MergeMp4 => "mp4",
            Self::ExtractMp3 { .. } => "mp3",
        }
    }
}

/// A full download.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub format_selector: String,
    /// Destination template, e.g. `downloads/tmp_<id>.%(ext)s`.
    pub output_template: PathBuf,
    pub post_process: PostProcess,
    /// Stops the download when cancelled.
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Downloading,
    /// One requested stream is fully retrieved. Merged downloads report
    /// this once per stream.
    Finished,
    /// Every byte is retrieved and post-processing (merge, extract) started.
    PostProcessing,
}

/// Progress reported by a resolver during a download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    pub status: DownloadStatus,
    pub percent: Option<f64>,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
}

impl DownloadProgress {
    pub fn downloading(percent: f64) -> Self {
        Self {
            status: DownloadStatus::Downloading,
            percent: Some(percent),
            speed: None,
            eta: None,
            downloaded_bytes: None,
            total_bytes: None,
        }
    }

    pub fn finished() -> Self {
        Self {
            status: DownloadStatus::Finished,
            percent: Some(100.0),
            speed: None,
            eta: None,
            downloaded_bytes: None,
            total_bytes: None,
        }
    }

    pub fn post_processing() -> Self {
        Self {
            status: DownloadStatus::PostProcessing,
            percent: None,
            speed: None,
            eta: None,
            downloaded_bytes: None,
            total_bytes: None,
        }
    }
}

/// Returned by a progress callback to keep going or stop the download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressControl {
    Continue,
    Cancel,
}

/// Result of a completed download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOutcome {
    pub title: String,
    /// Final path reported by the resolver, if it reports one.
    pub file_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(height: Option<u32>, vcodec: &str, size: Option<u64>) -> MediaFormat {
        MediaFormat {
            format_id: None,
            height,
            video_codec: Some(vcodec.to_string()),
            audio_codec: None,
            filesize_bytes: size,
        }
    }

    #[test]
    fn test_quality_options_unique_descending_then_audio() {
        let info = MediaInfo {
            title: "t".to_string(),
            formats: vec![
                format(Some(360), "avc1", Some(10)),
                format(Some(1080), "vp9", None),
                format(Some(720), "avc1", Some(50)),
                format(Some(720), "vp9", Some(70)),
                format(Some(480), "none", Some(1)),
                format(None, "avc1", None),
            ],
            ..Default::default()
        };

        let options = info.quality_options();
        let heights: Vec<u32> = options.iter().map(|o| o.height).collect();
        assert_eq!(heights, vec![1080, 720, 360, 0]);
        assert_eq!(options[0].label, "1080p");
        assert_eq!(options[1].filesize_bytes, Some(70));
        assert_eq!(options.last().unwrap().label, AUDIO_ONLY_LABEL);
    }

    #[test]
    fn test_quality_options_audio_only_source() {
        let options = MediaInfo::default().quality_options();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].height, 0);
    }

    #[test]
    fn test_user_agent_lookup_is_case_insensitive() {
        let mut stream = StreamDescriptor::new("https://cdn/v");
        assert_eq!(stream.user_agent(), None);
        stream
            .http_headers
            .insert("User-Agent".to_string(), "Mozilla/5.0".to_string());
        assert_eq!(stream.user_agent(), Some("Mozilla/5.0"));
    }

    #[test]
    fn test_post_process_extension() {
        assert_eq!(PostProcess::MergeMp4.extension(), "mp4");
        assert_eq!(PostProcess::ExtractMp3 { bitrate_kbps: 192 }.extension(), "mp3");
    }
}
