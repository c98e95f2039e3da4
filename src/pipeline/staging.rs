//! Per-run temporary storage for the uploaded file and anything derived from it.
//!
//! Each run gets its own directory under the upload root, so concurrent uploads
//! of identically named files never collide. The directory (and every artifact
//! in it) is removed by [`StagingScope::close`] or, if the run unwinds early, by
//! `Drop`.

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Longest sanitized filename we keep, in characters.
const MAX_FILENAME_CHARS: usize = 100;

/// Removing temporary files failed. Logged by the caller, never surfaced.
#[derive(Error, Debug)]
#[error("Failed to remove temporary files in {path}: {source}")]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Owns the temporary artifacts of exactly one pipeline run.
pub struct StagingScope {
    dir: tempfile::TempDir,
    artifacts: Vec<PathBuf>,
}

impl StagingScope {
    /// Create a fresh, uniquely named run directory under `root`.
    pub fn create(root: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix("run-").tempdir_in(root)?;
        tracing::debug!(dir = %dir.path().display(), "Staging scope created");
        Ok(Self {
            dir,
            artifacts: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Every file written into this scope so far, in creation order.
    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    /// Store the uploaded document under its sanitized original name.
    pub fn stage_upload(&mut self, original_name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        self.write_artifact(&sanitize_filename(original_name), bytes)
    }

    /// Write a derived artifact (e.g. a rendered page) into the scope.
    ///
    /// Existing artifacts are never overwritten; a taken name is
    /// `ErrorKind::AlreadyExists`.
    pub fn write_artifact(&mut self, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(sanitize_filename(name));
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.write_all(bytes)?;
        self.artifacts.push(path.clone());
        Ok(path)
    }

    /// Delete the run directory and everything in it.
    pub fn close(self) -> Result<(), CleanupError> {
        let path = self.dir.path().to_path_buf();
        let count = self.artifacts.len();
        self.dir
            .close()
            .map_err(|source| CleanupError { path: path.clone(), source })?;
        tracing::debug!(dir = %path.display(), artifacts = count, "Staging scope cleaned");
        Ok(())
    }
}

/// Sanitize a filename: strips path traversal and special characters.
pub fn sanitize_filename(name: &str) -> String {
    // Remove path separators and null bytes, replace other special chars
    let sanitized: String = name
        .chars()
        .filter(|&c| c != '/' && c != '\\' && c != '\0')
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    // Remove consecutive dots (path traversal prevention)
    let sanitized = sanitized.replace("..", "");
    let sanitized = sanitized.trim_start_matches('.').to_string();

    let sanitized = if sanitized.chars().count() > MAX_FILENAME_CHARS {
        sanitized.chars().take(MAX_FILENAME_CHARS).collect()
    } else {
        sanitized
    };

    if sanitized.is_empty() {
        "document".into()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_special_chars() {
        assert_eq!(sanitize_filename("my file (1).jpg"), "my_file__1_.jpg");
    }

    #[test]
    fn sanitize_keeps_normal_names() {
        assert_eq!(sanitize_filename("receipt.pdf"), "receipt.pdf");
        assert_eq!(sanitize_filename("scan-2024_v2.png"), "scan-2024_v2.png");
    }

    #[test]
    fn sanitize_strips_traversal() {
        let result = sanitize_filename("../../etc/passwd");
        assert!(!result.contains('/'));
        assert!(!result.contains(".."));
        assert!(!result.starts_with('.'));
    }

    #[test]
    fn sanitize_windows_path() {
        let result = sanitize_filename("C:\\Users\\me\\receipt.jpg");
        assert!(!result.contains('\\'));
        assert!(result.ends_with("receipt.jpg"));
    }

    #[test]
    fn sanitize_empty_falls_back() {
        assert_eq!(sanitize_filename(""), "document");
        assert_eq!(sanitize_filename("///"), "document");
    }

    #[test]
    fn sanitize_truncates_on_char_boundary() {
        let long: String = "é".repeat(150);
        let result = sanitize_filename(&long);
        assert_eq!(result.chars().count(), MAX_FILENAME_CHARS);
    }

    #[test]
    fn scope_tracks_and_removes_artifacts() {
        let root = tempfile::tempdir().unwrap();
        let mut scope = StagingScope::create(root.path()).unwrap();
        let upload = scope.stage_upload("receipt.pdf", b"%PDF-1.4").unwrap();
        let page = scope.write_artifact("receipt-page1.jpg", &[0xFF, 0xD8, 0xFF]).unwrap();

        assert!(upload.exists());
        assert!(page.exists());
        assert_eq!(scope.artifacts().len(), 2);
        let dir = scope.path().to_path_buf();

        scope.close().unwrap();
        assert!(!dir.exists());
        assert!(!upload.exists());
        assert!(!page.exists());
    }

    #[test]
    fn artifact_never_overwrites_upload() {
        let root = tempfile::tempdir().unwrap();
        let mut scope = StagingScope::create(root.path()).unwrap();
        let upload = scope.stage_upload("scan.jpg", b"%PDF-1.7").unwrap();

        let err = scope.write_artifact("scan.jpg", &[0xFF, 0xD8, 0xFF]).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read(&upload).unwrap(), b"%PDF-1.7");
        assert_eq!(scope.artifacts().len(), 1);
    }

    #[test]
    fn dropped_scope_is_removed() {
        let root = tempfile::tempdir().unwrap();
        let dir = {
            let mut scope = StagingScope::create(root.path()).unwrap();
            scope.stage_upload("a.jpg", b"x").unwrap();
            scope.path().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn concurrent_scopes_do_not_collide() {
        let root = tempfile::tempdir().unwrap();
        let mut first = StagingScope::create(root.path()).unwrap();
        let mut second = StagingScope::create(root.path()).unwrap();
        let a = first.stage_upload("receipt.jpg", b"one").unwrap();
        let b = second.stage_upload("receipt.jpg", b"two").unwrap();
        assert_ne!(a, b);
        assert_eq!(std::fs::read(&a).unwrap(), b"one");
        assert_eq!(std::fs::read(&b).unwrap(), b"two");
    }

    #[test]
    fn create_makes_missing_root() {
        let base = tempfile::tempdir().unwrap();
        let root = base.path().join("nested").join("uploads");
        let scope = StagingScope::create(&root).unwrap();
        assert!(scope.path().starts_with(&root));
    }
}
