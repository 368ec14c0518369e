//! Temporary files and final output naming.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::job::JobError;

/// Longest title fragment used in output names.
pub const MAX_TITLE_CHARS: usize = 60;

/// Files of one job that share the `<prefix><temp_id>` stem.
#[derive(Debug, Clone)]
pub struct TempFiles {
    dir: PathBuf,
    stem: String,
    temp_id: String,
}

impl TempFiles {
    pub fn new(dir: impl Into<PathBuf>, prefix: &str, temp_id: impl Into<String>) -> Self {
        let temp_id = temp_id.into();
        Self {
            dir: dir.into(),
            stem: format!("{}{}", prefix, temp_id),
            temp_id,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Destination template for the resolver, extension filled in by it.
    pub fn template(&self) -> PathBuf {
        self.dir.join(format!("{}.%(ext)s", self.stem))
    }

    pub fn path_with_extension(&self, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.stem, ext))
    }

    async fn matching(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with(&self.stem) {
                found.push(entry.path());
            }
        }
        found.sort();
        Ok(found)
    }

    /// Finds the produced file: the expected extension first, then any file
    /// with the stem.
    pub async fn locate(&self, ext: &str) -> Result<PathBuf, JobError> {
        let candidates = self.matching().await?;
        let expected = candidates
            .iter()
            .find(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext)));
        expected
            .or_else(|| candidates.first())
            .cloned()
            .ok_or_else(|| JobError::OutputNotFound {
                temp_id: self.temp_id.clone(),
            })
    }

    /// Deletes every file with the stem. Returns how many were removed.
    pub async fn cleanup(&self) -> usize {
        let candidates = match self.matching().await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(dir = %self.dir.display(), "Failed to scan for temp files: {}", e);
                return 0;
            }
        };

        let mut removed = 0;
        for path in candidates {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), "Failed to remove temp file: {}", e),
            }
        }
        if removed > 0 {
            debug!(stem = %self.stem, removed, "Temp files removed");
        }
        removed
    }
}

/// Keeps alphanumerics, spaces, hyphens and underscores, trimmed and cut to
/// [`MAX_TITLE_CHARS`]. Falls back to `download` when nothing is left.
pub fn sanitize_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let cut: String = kept.trim().chars().take(MAX_TITLE_CHARS).collect();
    let cut = cut.trim_end();
    if cut.is_empty() {
        "download".to_string()
    } else {
        cut.to_string()
    }
}

/// Moves `src` to `<dir>/<sanitized title>.<ext>`, returning the file name.
///
/// An existing file of the same name gets a numbered sibling instead of
/// being replaced. Names are claimed with a hard link, which fails if the
/// target exists, so concurrent jobs with the same title never collide.
pub async fn finalize_output(
    src: &Path,
    dir: &Path,
    title: &str,
    ext: &str,
) -> Result<String, JobError> {
    let base = sanitize_title(title);
    let candidate = |n: u32| {
        if n < 2 {
            format!("{}.{}", base, ext)
        } else {
            format!("{} ({}).{}", base, n, ext)
        }
    };

    let mut n = 1;
    loop {
        let name = candidate(n);
        let target = dir.join(&name);
        match tokio::fs::hard_link(src, &target).await {
            Ok(()) => {
                tokio::fs::remove_file(src).await?;
                debug!(from = %src.display(), to = %name, "Output renamed");
                return Ok(name);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => n += 1,
            // Filesystems without hard links.
            Err(_) if !tokio::fs::try_exists(&target).await? => {
                tokio::fs::rename(src, &target).await?;
                debug!(from = %src.display(), to = %name, "Output renamed");
                return Ok(name);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("Hello, World! (Live)"), "Hello World Live");
        assert_eq!(sanitize_title("  a/b\\c:d  "), "abcd");
        assert_eq!(sanitize_title("???"), "download");
        assert_eq!(sanitize_title("Ünïcödé_title-1"), "Ünïcödé_title-1");

        let long = "x".repeat(100);
        assert_eq!(sanitize_title(&long).chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_template_and_paths() {
        let files = TempFiles::new("/dl", "tmp_", "abc");
        assert_eq!(files.stem(), "tmp_abc");
        assert_eq!(files.template(), PathBuf::from("/dl/tmp_abc.%(ext)s"));
        assert_eq!(files.path_with_extension("mp3"), PathBuf::from("/dl/tmp_abc.mp3"));
    }

    #[tokio::test]
    async fn test_locate_prefers_expected_extension() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("tmp_abc.f137.webm"), b"v").unwrap();
        std::fs::write(dir.path().join("tmp_abc.mp4"), b"m").unwrap();
        std::fs::write(dir.path().join("tmp_other.mp4"), b"o").unwrap();

        let files = TempFiles::new(dir.path(), "tmp_", "abc");
        let found = files.locate("mp4").await.unwrap();
        assert_eq!(found, dir.path().join("tmp_abc.mp4"));
    }

    #[tokio::test]
    async fn test_locate_falls_back_to_any_extension() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("tmp_abc.mkv"), b"v").unwrap();

        let files = TempFiles::new(dir.path(), "tmp_", "abc");
        let found = files.locate("mp4").await.unwrap();
        assert_eq!(found, dir.path().join("tmp_abc.mkv"));
    }

    #[tokio::test]
    async fn test_locate_missing_is_output_not_found() {
        let dir = TempDir::new().unwrap();
        let files = TempFiles::new(dir.path(), "tmp_", "abc");
        let err = files.locate("mp4").await.unwrap_err();
        assert!(matches!(err, JobError::OutputNotFound { ref temp_id } if temp_id == "abc"));
    }

    #[tokio::test]
    async fn test_cleanup_only_touches_own_stem() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("tmp_abc.part"), b"1").unwrap();
        std::fs::write(dir.path().join("tmp_abc.f251.webm"), b"2").unwrap();
        std::fs::write(dir.path().join("tmp_xyz.mp4"), b"3").unwrap();
        std::fs::write(dir.path().join("Song.mp3"), b"4").unwrap();

        let files = TempFiles::new(dir.path(), "tmp_", "abc");
        assert_eq!(files.cleanup().await, 2);
        assert!(dir.path().join("tmp_xyz.mp4").exists());
        assert!(dir.path().join("Song.mp3").exists());
        assert_eq!(files.cleanup().await, 0);
    }

    #[tokio::test]
    async fn test_finalize_output_renames_without_clobbering() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("My Song.mp3"), b"old").unwrap();
        let src = dir.path().join("tmp_abc.mp3");
        std::fs::write(&src, b"new").unwrap();

        let name = finalize_output(&src, dir.path(), "My Song!", "mp3").await.unwrap();
        assert_eq!(name, "My Song (2).mp3");
        assert!(!src.exists());
        assert_eq!(std::fs::read(dir.path().join("My Song.mp3")).unwrap(), b"old");
        assert_eq!(std::fs::read(dir.path().join(&name)).unwrap(), b"new");
    }
}
