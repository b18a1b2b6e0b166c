#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Local staging directory for downloaded attachment copies.
//!
//! Every plan stages its bytes under its unique new name before any upload,
//! so the upload step reads a stable byte-identical copy and large payloads
//! never sit in memory. Cleanup is best-effort by design: a failed removal
//! must never fail the run.

mod error;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

pub use error::{FsOpsError, FsOpsResult};

/// A created staging directory handing out per-plan file paths.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    /// Create the staging directory (and any missing parents) at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Io`] when the directory cannot be created.
    pub fn prepare(root: impl Into<PathBuf>) -> FsOpsResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| FsOpsError::io("create_dir", &root, err))?;
        debug!(path = %root.display(), "staging directory ready");
        Ok(Self { root })
    }

    /// Path of the staging directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the staging path for a plan's new file name.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::InvalidInput`] when the name is empty or would
    /// escape the staging directory (path separators or `..`).
    pub fn file_path(&self, name: &str) -> FsOpsResult<PathBuf> {
        if name.is_empty() {
            return Err(FsOpsError::InvalidInput {
                field: "new_name",
                reason: "must not be empty",
                value: name.to_string(),
            });
        }
        if name.contains(['/', '\\']) || name == ".." {
            return Err(FsOpsError::InvalidInput {
                field: "new_name",
                reason: "must be a bare file name",
                value: name.to_string(),
            });
        }
        Ok(self.root.join(name))
    }
}

/// Recursively remove a staging directory.
///
/// A missing directory is a no-op; returns whether anything was removed.
///
/// # Errors
///
/// Returns [`FsOpsError::Io`] when the directory exists but cannot be
/// removed. Callers treat this as non-fatal.
pub fn remove_staging(root: &Path) -> FsOpsResult<bool> {
    if !root.exists() {
        debug!(path = %root.display(), "staging directory already absent");
        return Ok(false);
    }
    fs::remove_dir_all(root).map_err(|err| FsOpsError::io("remove_dir", root, err))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn temp_root() -> TempDir {
        tempfile::Builder::new()
            .prefix("reattach-fsops-")
            .tempdir()
            .expect("temp dir")
    }

    #[test]
    fn prepare_creates_nested_directories() {
        let temp = temp_root();
        let root = temp.path().join("a/b/staging");

        let staging = StagingArea::prepare(&root).expect("prepare");
        assert!(staging.root().is_dir());
    }

    #[test]
    fn prepare_is_idempotent() {
        let temp = temp_root();
        let root = temp.path().join("staging");
        StagingArea::prepare(&root).expect("first prepare");
        StagingArea::prepare(&root).expect("second prepare");
    }

    #[test]
    fn file_path_joins_bare_names() {
        let temp = temp_root();
        let staging = StagingArea::prepare(temp.path().join("staging")).expect("prepare");
        let path = staging.file_path("PK_photo_00007.jpg").expect("path");
        assert_eq!(path, staging.root().join("PK_photo_00007.jpg"));
    }

    #[test]
    fn file_path_rejects_escaping_names() {
        let temp = temp_root();
        let staging = StagingArea::prepare(temp.path().join("staging")).expect("prepare");
        for bad in ["", "..", "a/b.png", "a\\b.png"] {
            let err = staging.file_path(bad).expect_err("name should be rejected");
            assert!(matches!(err, FsOpsError::InvalidInput { field: "new_name", .. }));
        }
    }

    #[test]
    fn remove_staging_deletes_directory_and_contents() {
        let temp = temp_root();
        let staging = StagingArea::prepare(temp.path().join("staging")).expect("prepare");
        let file = staging.file_path("image_00001.png").expect("path");
        fs::write(&file, b"bytes").expect("write");

        assert!(remove_staging(staging.root()).expect("remove"));
        assert!(!staging.root().exists());
    }

    #[test]
    fn remove_staging_is_a_noop_when_absent() {
        let temp = temp_root();
        let missing = temp.path().join("never-created");
        assert!(!remove_staging(&missing).expect("noop"));
    }
}
