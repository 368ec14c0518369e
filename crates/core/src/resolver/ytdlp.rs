//! yt-dlp backed resolver.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::ResolverConfig;
use super::error::ResolverError;
use super::traits::{MediaResolver, ProgressCallback};
use super::types::{
    DownloadOutcome, DownloadProgress, DownloadRequest, DownloadStatus, MediaFormat, MediaInfo,
    PostProcess, ProgressControl, StreamDescriptor,
};

const PROGRESS_MARK: &str = "[ytcut] ";
const TITLE_MARK: &str = "[ytcut-title] ";
const FILE_MARK: &str = "[ytcut-file] ";

const PROGRESS_TEMPLATE: &str = "download:[ytcut] %(progress.status)s|%(progress._percent_str)s|%(progress._speed_str)s|%(progress._eta_str)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s";
const POSTPROCESS_TEMPLATE: &str = "postprocess:[ytcut] postprocess|%(progress.postprocessor)s";

static ANSI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("valid ANSI regex"));

/// Resolver that shells out to the yt-dlp CLI.
#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    config: ResolverConfig,
}

impl YtDlpResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.yt_dlp_path);
        cmd.args(&self.config.extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn map_spawn_error(&self, e: std::io::Error) -> ResolverError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ResolverError::NotFound {
                path: self.config.yt_dlp_path.clone(),
            }
        } else {
            ResolverError::Io(e)
        }
    }

    /// Arguments for a full download, URL last.
    pub fn download_args(request: &DownloadRequest) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--newline".into(),
            "--no-warnings".into(),
            "--no-playlist".into(),
            "--progress".into(),
            "--progress-template".into(),
            PROGRESS_TEMPLATE.into(),
            "--progress-template".into(),
            POSTPROCESS_TEMPLATE.into(),
            "-f".into(),
            request.format_selector.clone(),
            "-o".into(),
            request.output_template.to_string_lossy().into_owned(),
        ];

        match request.post_process {
            PostProcess::MergeMp4 => {
                args.extend(["--merge-output-format", "mp4"].map(String::from));
            }
            PostProcess::ExtractMp3 { bitrate_kbps } => {
                args.extend(["-x", "--audio-format", "mp3", "--audio-quality"].map(String::from));
                args.push(format!("{}K", bitrate_kbps));
            }
        }

        args.push("--print".into());
        args.push(format!("after_move:{}%(title)s", TITLE_MARK));
        args.push("--print".into());
        args.push(format!("after_move:{}%(filepath)s", FILE_MARK));
        args.push(request.url.clone());
        args
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn resolve(
        &self,
        url: &str,
        format_selector: Option<&str>,
    ) -> Result<MediaInfo, ResolverError> {
        let mut cmd = self.command();
        cmd.args(["-J", "--no-warnings", "--no-playlist"]);
        if let Some(selector) = format_selector {
            cmd.args(["-f", selector]);
        }
        cmd.arg(url);

        debug!(url = %url, ?format_selector, "Resolving media info");
        let output = cmd.output().await.map_err(|e| self.map_spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<String> = stderr.lines().map(str::to_string).collect();
            return Err(ResolverError::failed(error_message(
                &lines,
                output.status.code(),
            )));
        }

        parse_info_json(&output.stdout)
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        on_progress: ProgressCallback<'_>,
    ) -> Result<DownloadOutcome, ResolverError> {
        let args = Self::download_args(request);
        info!(url = %request.url, selector = %request.format_selector, "Starting yt-dlp download");

        let mut cmd = self.command();
        cmd.args(&args);
        let mut child = cmd.spawn().map_err(|e| self.map_spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("yt-dlp stdout not captured"))?;
        let stderr_task = child.stderr.take().map(spawn_stderr_collector);

        let mut lines = BufReader::new(stdout).lines();
        let mut title: Option<String> = None;
        let mut file_path: Option<PathBuf> = None;
        let mut cancelled = false;

        loop {
            tokio::select! {
                biased;
                _ = request.cancel.cancelled() => { cancelled = true; break; }
                line = lines.next_line() => match line {
                    Ok(Some(raw)) => {
                        let line = strip_ansi(&raw);
                        if let Some(rest) = line.strip_prefix(TITLE_MARK) {
                            title = Some(rest.trim().to_string());
                        } else if let Some(rest) = line.strip_prefix(FILE_MARK) {
                            file_path = Some(PathBuf::from(rest.trim()));
                        } else if let Some(progress) = parse_progress_line(&line) {
                            if on_progress(progress) == ProgressControl::Cancel {
                                cancelled = true;
                                break;
                            }
                        } else {
                            debug!(target: "ytcut_core::resolver::stdout", "{}", line);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Failed reading yt-dlp output: {}", e);
                        break;
                    }
                },
            }
        }

        let status = if cancelled {
            None
        } else {
            tokio::select! {
                biased;
                _ = request.cancel.cancelled() => None,
                status = child.wait() => Some(status),
            }
        };

        let status = match status {
            Some(status) => status?,
            None => {
                if let Err(e) = child.kill().await {
                    debug!("Kill after cancel returned: {}", e);
                }
                if let Some(task) = stderr_task {
                    task.abort();
                }
                info!(url = %request.url, "yt-dlp download cancelled");
                return Err(ResolverError::Cancelled);
            }
        };

        let stderr_lines = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };

        if !status.success() {
            return Err(ResolverError::failed(error_message(&stderr_lines, status.code())));
        }

        Ok(DownloadOutcome {
            title: title.filter(|t| !t.is_empty()).unwrap_or_else(|| "download".to_string()),
            file_path,
        })
    }
}

fn spawn_stderr_collector<R>(stderr: R) -> JoinHandle<Vec<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut tail = VecDeque::with_capacity(20);
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: "ytcut_core::resolver::stderr", "{}", line);
            if tail.len() == 20 {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        tail.into_iter().collect()
    })
}

/// Removes terminal color codes.
pub fn strip_ansi(line: &str) -> String {
    ANSI_RE.replace_all(line, "").into_owned()
}

/// Picks the most useful message from yt-dlp's stderr.
fn error_message(stderr_lines: &[String], code: Option<i32>) -> String {
    let cleaned: Vec<String> = stderr_lines
        .iter()
        .map(|l| strip_ansi(l).trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();

    cleaned
        .iter()
        .rev()
        .find_map(|l| l.strip_prefix("ERROR:").map(|m| m.trim().to_string()))
        .or_else(|| cleaned.last().cloned())
        .unwrap_or_else(|| format!("yt-dlp exited with code {:?}", code))
}

/// Parses one line written by [`PROGRESS_TEMPLATE`] or
/// [`POSTPROCESS_TEMPLATE`], or a post-processor banner.
pub fn parse_progress_line(line: &str) -> Option<DownloadProgress> {
    let line = line.trim();
    if line.starts_with("[Merger]") || line.starts_with("[ExtractAudio]") {
        return Some(DownloadProgress::post_processing());
    }

    let rest = line.strip_prefix(PROGRESS_MARK.trim_end())?.trim_start();
    let mut parts = rest.split('|');
    let status = match parts.next()?.trim() {
        "downloading" => DownloadStatus::Downloading,
        "finished" => DownloadStatus::Finished,
        "postprocess" => return Some(DownloadProgress::post_processing()),
        _ => return None,
    };

    let percent = parts.next().and_then(parse_percent);
    let speed = parts.next().and_then(display_value);
    let eta = parts.next().and_then(display_value);
    let downloaded_bytes = parts.next().and_then(parse_bytes);
    let total_bytes = parts.next().and_then(parse_bytes);

    let percent = match status {
        DownloadStatus::Finished => Some(percent.unwrap_or(100.0)),
        DownloadStatus::Downloading | DownloadStatus::PostProcessing => percent,
    };

    Some(DownloadProgress {
        status,
        percent,
        speed,
        eta,
        downloaded_bytes,
        total_bytes,
    })
}

fn parse_percent(value: &str) -> Option<f64> {
    value.trim().trim_end_matches('%').trim().parse::<f64>().ok()
}

fn parse_bytes(value: &str) -> Option<u64> {
    let value = value.trim();
    value
        .parse::<u64>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u64))
}

fn display_value(value: &str) -> Option<String> {
    let value = value.trim();
    match value {
        "" | "NA" | "N/A" | "Unknown" | "None" => None,
        _ => Some(value.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    url: Option<String>,
    #[serde(default)]
    http_headers: HashMap<String, String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
    #[serde(default)]
    requested_formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: Option<String>,
    height: Option<f64>,
    vcodec: Option<String>,
    acodec: Option<String>,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
    url: Option<String>,
    #[serde(default)]
    http_headers: HashMap<String, String>,
}

impl RawFormat {
    fn to_format(&self) -> MediaFormat {
        MediaFormat {
            format_id: self.format_id.clone(),
            height: self.height.filter(|h| *h > 0.0).map(|h| h as u32),
            video_codec: self.vcodec.clone(),
            audio_codec: self.acodec.clone(),
            filesize_bytes: self
                .filesize
                .or(self.filesize_approx)
                .filter(|s| *s >= 0.0)
                .map(|s| s as u64),
        }
    }
}

/// Converts a `yt-dlp -J` dump into [`MediaInfo`].
pub fn parse_info_json(bytes: &[u8]) -> Result<MediaInfo, ResolverError> {
    let raw: RawInfo = serde_json::from_slice(bytes).map_err(|e| ResolverError::Parse {
        reason: e.to_string(),
    })?;

    let streams = if raw.requested_formats.is_empty() {
        raw.url
            .map(|url| {
                vec![StreamDescriptor {
                    url,
                    http_headers: raw.http_headers,
                }]
            })
            .unwrap_or_default()
    } else {
        raw.requested_formats
            .into_iter()
            .filter_map(|f| {
                f.url.map(|url| StreamDescriptor {
                    url,
                    http_headers: f.http_headers,
                })
            })
            .collect()
    };

    Ok(MediaInfo {
        title: raw.title.unwrap_or_else(|| "Unknown".to_string()),
        duration_secs: raw.duration.unwrap_or(0.0).max(0.0),
        thumbnail: raw.thumbnail.filter(|t| !t.is_empty()),
        uploader: raw.uploader.or(raw.channel),
        formats: raw.formats.iter().map(RawFormat::to_format).collect(),
        streams,
    })
}
