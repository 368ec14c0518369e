//! Parser for ffmpeg's `-progress` output.
//!
//! ffmpeg writes newline-delimited `key=value` pairs and closes every record
//! with a `progress=continue` or `progress=end` line.

/// Highest percentage a clip may report before it is done.
pub const MAX_CLIP_PCT: f64 = 99.0;

/// One flushed progress record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipProgress {
    /// Percentage of the clip written, capped at [`MAX_CLIP_PCT`].
    pub pct: f64,
    /// Seconds of output written so far.
    pub elapsed_secs: f64,
    /// Running size of the output file.
    pub downloaded_bytes: Option<u64>,
    /// Display speed as reported, e.g. `1.02x`.
    pub speed: Option<String>,
    /// The record ended with `progress=end`.
    pub finished: bool,
}

#[derive(Debug, Default)]
struct PendingRecord {
    out_time_us: Option<i64>,
    total_size: Option<u64>,
    speed: Option<String>,
}

/// Accumulates `key=value` lines and flushes a [`ClipProgress`] per record.
#[derive(Debug)]
pub struct ProgressParser {
    clip_duration_secs: f64,
    pending: PendingRecord,
}

impl ProgressParser {
    pub fn new(clip_duration_secs: f64) -> Self {
        Self {
            clip_duration_secs,
            pending: PendingRecord::default(),
        }
    }

    /// Feeds one line; returns a record when the line is the `progress` sentinel.
    pub fn feed_line(&mut self, line: &str) -> Option<ClipProgress> {
        let (key, value) = line.trim().split_once('=')?;
        let value = value.trim();

        match key.trim() {
            "out_time_us" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.pending.out_time_us = Some(us);
                }
            }
            // Despite the name ffmpeg reports microseconds here too.
            "out_time_ms" => {
                if self.pending.out_time_us.is_none() {
                    if let Ok(us) = value.parse::<i64>() {
                        self.pending.out_time_us = Some(us);
                    }
                }
            }
            "total_size" => {
                if let Ok(bytes) = value.parse::<u64>() {
                    self.pending.total_size = Some(bytes);
                }
            }
            "speed" => {
                if !value.is_empty() && value != "N/A" {
                    self.pending.speed = Some(value.to_string());
                }
            }
            "progress" => return Some(self.flush(value == "end")),
            _ => {}
        }
        None
    }

    fn flush(&mut self, finished: bool) -> ClipProgress {
        let record = std::mem::take(&mut self.pending);
        let elapsed_secs = record.out_time_us.unwrap_or(0).max(0) as f64 / 1_000_000.0;
        ClipProgress {
            pct: clip_pct(elapsed_secs, self.clip_duration_secs),
            elapsed_secs,
            downloaded_bytes: record.total_size,
            speed: record.speed,
            finished,
        }
    }
}

/// Clip completion for `elapsed_secs` of output, never above [`MAX_CLIP_PCT`].
pub fn clip_pct(elapsed_secs: f64, clip_duration_secs: f64) -> f64 {
    if clip_duration_secs <= 0.0 || !elapsed_secs.is_finite() {
        return 0.0;
    }
    (elapsed_secs / clip_duration_secs * 100.0).clamp(0.0, MAX_CLIP_PCT)
}
