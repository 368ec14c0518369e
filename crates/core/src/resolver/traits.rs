//! Trait definitions for the resolver module.

use async_trait::async_trait;

use super::error::ResolverError;
use super::types::{DownloadOutcome, DownloadProgress, DownloadRequest, MediaInfo, ProgressControl};

/// Progress callback handed to [`MediaResolver::download`].
///
/// Returning [`ProgressControl::Cancel`] stops the download, which then
/// fails with [`ResolverError::Cancelled`].
pub type ProgressCallback<'a> = &'a (dyn Fn(DownloadProgress) -> ProgressControl + Send + Sync);

/// Turns URLs into metadata and downloaded files.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Returns the name of this resolver implementation.
    fn name(&self) -> &str;

    /// Resolves metadata without downloading.
    ///
    /// With a `format_selector`, `MediaInfo::streams` holds the direct URLs
    /// of the selected formats.
    async fn resolve(
        &self,
        url: &str,
        format_selector: Option<&str>,
    ) -> Result<MediaInfo, ResolverError>;

    /// Downloads and post-processes the whole asset.
    async fn download(
        &self,
        request: &DownloadRequest,
        on_progress: ProgressCallback<'_>,
    ) -> Result<DownloadOutcome, ResolverError>;
}
