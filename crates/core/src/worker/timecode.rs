//! Time strings and clip windows.

use thiserror::Error;

/// Shortest clip ever requested from the clipping tool.
pub const MIN_CLIP_SECS: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimecodeError {
    #[error("invalid time '{0}': expected SS, MM:SS or HH:MM:SS")]
    Malformed(String),
}

/// Parses `SS`, `MM:SS` or `HH:MM:SS` into seconds. Fields may be fractional.
pub fn parse_time(value: &str) -> Result<f64, TimecodeError> {
    let malformed = || TimecodeError::Malformed(value.to_string());
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(malformed());
    }

    let fields = trimmed
        .split(':')
        .map(|field| {
            let field = field.trim();
            if field.is_empty() || field.starts_with(['+', '-']) {
                return Err(malformed());
            }
            field
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(malformed)
        })
        .collect::<Result<Vec<f64>, _>>()?;

    match fields.as_slice() {
        [s] => Ok(*s),
        [m, s] => Ok(m * 60.0 + s),
        [h, m, s] => Ok(h * 3600.0 + m * 60.0 + s),
        _ => Err(malformed()),
    }
}

/// Seek offset and length of a clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipWindow {
    pub start_secs: f64,
    pub duration_secs: f64,
}

impl ClipWindow {
    /// A missing start means the beginning, a missing end means the media end.
    /// Inverted or empty ranges collapse to [`MIN_CLIP_SECS`].
    pub fn from_bounds(start_secs: Option<f64>, end_secs: Option<f64>, media_duration_secs: f64) -> Self {
        let start_secs = start_secs.unwrap_or(0.0);
        let end_secs = end_secs.unwrap_or(media_duration_secs);
        Self {
            start_secs,
            duration_secs: (end_secs - start_secs).max(MIN_CLIP_SECS),
        }
    }
}

/// Computes the clip window from optional time strings and the media duration.
pub fn clip_window(
    start: Option<&str>,
    end: Option<&str>,
    media_duration_secs: f64,
) -> Result<ClipWindow, TimecodeError> {
    let start_secs = start.map(parse_time).transpose()?;
    let end_secs = end.map(parse_time).transpose()?;
    Ok(ClipWindow::from_bounds(start_secs, end_secs, media_duration_secs))
}

/// Formats seconds as `MM:SS`, or `HH:MM:SS` from one hour on.
pub fn seconds_to_hms(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs as u64
    } else {
        0
    };
    let (h, rem) = (total / 3600, total % 3600);
    let (m, s) = (rem / 60, rem % 60);
    if h > 0 {
        format!("{:02}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}
