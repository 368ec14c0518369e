//! Testing utilities and mock implementations.
//!
//! # Example
//!
//! ```rust,ignore
//! use ytcut_core::testing::{fixtures, MockResolver};
//!
//! let resolver = MockResolver::new().with_info(fixtures::media_info("Clip me", 30.0));
//! // Use in a JobOrchestrator...
//! ```

mod mock_resolver;

pub use mock_resolver::MockResolver;

/// Writes an executable shell script standing in for an external tool.
///
/// The script receives the same arguments as the real tool, so
/// `for last; do :; done` yields the output path.
#[cfg(unix)]
pub fn write_fake_tool(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write fake tool");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("make fake tool executable");
    path
}

/// Script body for a clipping tool that reports progress and writes its output.
pub const FAKE_FFMPEG_OK: &str = r#"for last; do :; done
printf 'out_time_us=1000000\ntotal_size=1024\nspeed=1.0x\nprogress=continue\n'
printf 'out_time_us=5000000\ntotal_size=4096\nspeed=1.2x\nprogress=end\n'
: > "$last""#;

/// Script body for a clipping tool that reports once then hangs.
pub const FAKE_FFMPEG_HANG: &str = r#"printf 'out_time_us=500000\nprogress=continue\n'
exec sleep 30"#;

/// Script body for a clipping tool that fails.
pub const FAKE_FFMPEG_FAIL: &str = r#"echo 'Server returned 403 Forbidden' >&2
exit 1"#;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::job::ClipRequest;
    use crate::resolver::{MediaFormat, MediaInfo, StreamDescriptor};

    /// Metadata with three video heights, an audio format and separate
    /// video/audio streams.
    pub fn media_info(title: &str, duration_secs: f64) -> MediaInfo {
        let video = |id: &str, height: u32, size: u64| MediaFormat {
            format_id: Some(id.to_string()),
            height: Some(height),
            video_codec: Some("avc1.640028".to_string()),
            audio_codec: Some("none".to_string()),
            filesize_bytes: Some(size),
        };

        let mut video_stream = StreamDescriptor::new("https://media.example.com/video.mp4");
        video_stream
            .http_headers
            .insert("User-Agent".to_string(), "Mozilla/5.0 (ytcut test)".to_string());

        MediaInfo {
            title: title.to_string(),
            duration_secs,
            thumbnail: Some("https://i.example.com/thumb.jpg".to_string()),
            uploader: Some("Test Channel".to_string()),
            formats: vec![
                video("137", 1080, 40_000_000),
                video("136", 720, 20_000_000),
                video("134", 360, 5_000_000),
                MediaFormat {
                    format_id: Some("140".to_string()),
                    height: None,
                    video_codec: Some("none".to_string()),
                    audio_codec: Some("mp4a.40.2".to_string()),
                    filesize_bytes: Some(3_000_000),
                },
            ],
            streams: vec![
                video_stream,
                StreamDescriptor::new("https://media.example.com/audio.m4a"),
            ],
        }
    }

    /// Metadata whose selector resolves to one combined stream.
    pub fn combined_media_info(title: &str, duration_secs: f64) -> MediaInfo {
        let mut info = media_info(title, duration_secs);
        info.streams = vec![StreamDescriptor::new("https://media.example.com/combined.mp4")];
        info
    }

    /// A clip request for `url` with both bounds set.
    pub fn clip_request(height: u32, start: &str, end: &str) -> ClipRequest {
        ClipRequest::new("https://www.example.com/watch?v=abc", height)
            .with_range(Some(start), Some(end))
    }
}
