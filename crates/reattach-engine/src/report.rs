//! Summary of a completed run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Counters and outcomes accumulated across one migration run.
///
/// Per-plan failures do not abort the run, so the report is the caller's
/// view of partial success. `failed` counts plans that failed at any step;
/// a run with `failed > 0` still completed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RunReport {
    /// Records inspected across all listing pages.
    pub records_seen: usize,
    /// Records that matched the naming convention.
    pub matched: usize,
    /// Plans whose bytes were staged locally.
    pub downloaded: usize,
    /// Plans whose upload step succeeded.
    pub uploaded: usize,
    /// Placeholders linked to their owning items (by-item strategy only).
    pub linked: usize,
    /// Original attachments deleted (by-item strategy only).
    pub deleted: usize,
    /// Plans that failed at any step.
    pub failed: usize,
    /// Set when the by-item delete phase was suppressed because not every
    /// plan was uploaded and linked.
    pub delete_phase_skipped: bool,
    /// Work-tracking key of the batched rename, when one was submitted.
    pub work_key: Option<String>,
    /// Staging directory still on disk after the run, either kept on
    /// request or left behind by a failed cleanup.
    pub staging_dir: Option<PathBuf>,
}

impl RunReport {
    /// Start a report for a filtered record set.
    #[must_use]
    pub fn new(records_seen: usize, matched: usize) -> Self {
        Self {
            records_seen,
            matched,
            ..Self::default()
        }
    }

    /// Whether every matched plan made it through its full write sequence.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failed == 0 && !self.delete_phase_skipped
    }
}
