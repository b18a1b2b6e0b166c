//! # Design
//!
//! - Only failures that abort a run become errors here; per-plan failures
//!   are narrated through the event bus and counted in the report.
//! - Constant messages, with context in fields and sources preserved.

use reattach_client::ApiError;
use reattach_fsops::FsOpsError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Run-aborting failures.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The record listing could not be completed.
    #[error("listing failed")]
    Listing {
        /// Underlying API failure.
        source: ApiError,
    },
    /// The staging directory could not be prepared.
    #[error("staging setup failed")]
    Staging {
        /// Underlying filesystem failure.
        source: FsOpsError,
    },
    /// The supplied run options are inconsistent.
    #[error("invalid run options")]
    InvalidOptions {
        /// Offending option.
        field: &'static str,
        /// Static reason the combination is rejected.
        reason: &'static str,
    },
}

impl EngineError {
    /// Human-readable line including the captured context fields.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Listing { source } => format!("listing failed: {}", source.detail()),
            Self::Staging { source } => format!("staging setup failed: {}", source.detail()),
            Self::InvalidOptions { field, reason } => format!("{field} {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_chains_the_source_context() {
        let err = EngineError::Listing {
            source: ApiError::Http {
                operation: "list_items_by_type",
                status: 500,
                message: None,
            },
        };
        assert_eq!(err.detail(), "listing failed: list_items_by_type: HTTP 500");
    }
}
