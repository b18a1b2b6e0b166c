//! # Design
//!
//! - Provide structured, constant-message errors for staging operations.
//! - Capture operation context (paths, fields) to make failures reproducible in tests.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for staging operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced by the staging area.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// IO failures while interacting with the filesystem.
    #[error("staging io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Input validation failures.
    #[error("staging invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value.
        value: String,
    },
}

impl FsOpsError {
    /// Human-readable line including the captured context fields.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Io {
                operation,
                path,
                source,
            } => format!("{operation} failed for {}: {source}", path.display()),
            Self::InvalidInput {
                field,
                reason,
                value,
            } => format!("{field} {reason} (got {value:?})"),
        }
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn io_helper_preserves_the_source() {
        let err = FsOpsError::io("create_dir", "staging", io::Error::other("io"));
        assert!(matches!(err, FsOpsError::Io { operation: "create_dir", .. }));
        assert!(err.source().is_some());
    }
}
