//! Mock resolver for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::resolver::{
    DownloadOutcome, DownloadProgress, DownloadRequest, MediaInfo, MediaResolver,
    ProgressCallback, ProgressControl, ResolverError,
};

/// Mock implementation of the MediaResolver trait.
///
/// Provides controllable behavior for testing:
/// - Fixed metadata for every URL
/// - Scripted download progress, optionally paced
/// - Injected resolve/download failures
/// - Downloads that hang until cancelled
/// - Recorded requests for assertions
///
/// A successful download writes an empty file at the request's output
/// template, the way the real resolver leaves its temp file behind.
///
/// # Example
///
/// ```rust,ignore
/// use ytcut_core::testing::{fixtures, MockResolver};
///
/// let resolver = MockResolver::new()
///     .with_info(fixtures::media_info("Video", 60.0))
///     .with_progress(vec![DownloadProgress::downloading(50.0), DownloadProgress::finished()]);
/// let log = resolver.download_log();
/// ```
#[derive(Debug, Clone)]
pub struct MockResolver {
    info: MediaInfo,
    progress: Vec<DownloadProgress>,
    step_delay: Duration,
    output_extension: Option<String>,
    resolve_error: Option<String>,
    download_error: Option<String>,
    leftover_temp_file: bool,
    hang_until_cancelled: bool,
    resolve_calls: Arc<AtomicUsize>,
    resolved_selectors: Arc<Mutex<Vec<Option<String>>>>,
    downloads: Arc<Mutex<Vec<DownloadRequest>>>,
}

impl Default for MockResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockResolver {
    /// Create a new mock resolver with fixture metadata and no progress.
    pub fn new() -> Self {
        Self {
            info: super::fixtures::media_info("Test Video", 60.0),
            progress: Vec::new(),
            step_delay: Duration::ZERO,
            output_extension: None,
            resolve_error: None,
            download_error: None,
            leftover_temp_file: false,
            hang_until_cancelled: false,
            resolve_calls: Arc::new(AtomicUsize::new(0)),
            resolved_selectors: Arc::new(Mutex::new(Vec::new())),
            downloads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_info(mut self, info: MediaInfo) -> Self {
        self.info = info;
        self
    }

    /// Progress reports delivered, in order, during a download.
    pub fn with_progress(mut self, progress: Vec<DownloadProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Pause between progress reports.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Extension of the written file; defaults to the post-processing target.
    pub fn with_output_extension(mut self, ext: impl Into<String>) -> Self {
        self.output_extension = Some(ext.into());
        self
    }

    pub fn with_resolve_error(mut self, message: impl Into<String>) -> Self {
        self.resolve_error = Some(message.into());
        self
    }

    /// Fail the download after all progress was reported.
    pub fn with_download_error(mut self, message: impl Into<String>) -> Self {
        self.download_error = Some(message.into());
        self
    }

    /// Leave a `.part` file behind before finishing or failing.
    pub fn with_leftover_temp_file(mut self) -> Self {
        self.leftover_temp_file = true;
        self
    }

    /// Block every download until its cancellation token fires.
    pub fn hanging_until_cancelled(mut self) -> Self {
        self.hang_until_cancelled = true;
        self
    }

    /// Shared counter of `resolve` calls.
    pub fn resolve_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.resolve_calls)
    }

    /// Shared log of selectors passed to `resolve`.
    pub fn resolve_log(&self) -> Arc<Mutex<Vec<Option<String>>>> {
        Arc::clone(&self.resolved_selectors)
    }

    /// Shared log of download requests.
    pub fn download_log(&self) -> Arc<Mutex<Vec<DownloadRequest>>> {
        Arc::clone(&self.downloads)
    }

    fn template_path(request: &DownloadRequest, ext: &str) -> PathBuf {
        let template = request.output_template.to_string_lossy();
        PathBuf::from(template.replace("%(ext)s", ext))
    }
}

#[async_trait]
impl MediaResolver for MockResolver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn resolve(
        &self,
        _url: &str,
        format_selector: Option<&str>,
    ) -> Result<MediaInfo, ResolverError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = self.resolved_selectors.lock() {
            log.push(format_selector.map(str::to_string));
        }

        match &self.resolve_error {
            Some(message) => Err(ResolverError::failed(message.clone())),
            None => Ok(self.info.clone()),
        }
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        on_progress: ProgressCallback<'_>,
    ) -> Result<DownloadOutcome, ResolverError> {
        if let Ok(mut log) = self.downloads.lock() {
            log.push(request.clone());
        }

        if self.leftover_temp_file {
            tokio::fs::write(Self::template_path(request, "part"), b"partial").await?;
        }

        if self.hang_until_cancelled {
            request.cancel.cancelled().await;
            return Err(ResolverError::Cancelled);
        }

        for progress in &self.progress {
            if !self.step_delay.is_zero() {
                tokio::select! {
                    _ = request.cancel.cancelled() => return Err(ResolverError::Cancelled),
                    _ = tokio::time::sleep(self.step_delay) => {}
                }
            }
            if on_progress(progress.clone()) == ProgressControl::Cancel {
                return Err(ResolverError::Cancelled);
            }
        }

        if let Some(message) = &self.download_error {
            return Err(ResolverError::failed(message.clone()));
        }

        let ext = self
            .output_extension
            .clone()
            .unwrap_or_else(|| request.post_process.extension().to_string());
        tokio::fs::write(Self::template_path(request, &ext), b"media").await?;

        Ok(DownloadOutcome {
            title: self.info.title.clone(),
            file_path: None,
        })
    }
}
