//! Domain snapshots and per-run configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Immutable snapshot of a remote attachment record, normalised from either
/// listing shape. Never persisted beyond the run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentRecord {
    /// Remote identifier of the attachment.
    pub id: i64,
    /// Display name of the record.
    pub name: String,
    /// Stored filename, when the remote system recorded one.
    pub filename: Option<String>,
    /// Identifier of the owning item, when item-scoped.
    pub item_id: Option<i64>,
    /// Item-type identifier, when the listing includes it.
    pub item_type: Option<i64>,
}

/// Work unit derived from a matching [`AttachmentRecord`]. Created during
/// filtering, mutated once when the download lands, discarded after the run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenamePlan {
    /// Identifier of the original attachment.
    pub attachment_id: i64,
    /// Display name before the rename.
    pub original_name: String,
    /// Computed replacement name (`{prefix}{base}_{counter:05}{ext}`).
    pub new_name: String,
    /// Owning item identifier carried over from the record.
    pub item_id: Option<i64>,
    /// Staging path of the downloaded copy; `None` until (and unless) the
    /// download succeeds. Later steps skip plans without a local file.
    pub local_path: Option<PathBuf>,
    /// Set when the record had no stored filename and the split fell back to
    /// the display name, which can lose the true extension.
    pub name_split_fallback: bool,
}

impl RenamePlan {
    /// Whether the plan's bytes were staged and may be uploaded.
    #[must_use]
    pub const fn is_staged(&self) -> bool {
        self.local_path.is_some()
    }
}

/// Remote write sequence applied after the download phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WriteStrategy {
    /// Create a placeholder per plan, upload into it, link it to the owning
    /// item, and delete the originals once every plan succeeded.
    ByItem,
    /// Overwrite each original attachment's binary content in place; the
    /// remote record's name is left untouched and nothing is deleted.
    InPlace,
    /// [`Self::InPlace`] plus one batched asynchronous rename request
    /// submitted after all transfers; acknowledged with a work key that is
    /// reported but never polled.
    InPlaceRename,
}

impl WriteStrategy {
    /// Stable label used in events and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ByItem => "by_item",
            Self::InPlace => "in_place",
            Self::InPlaceRename => "in_place_rename",
        }
    }

    /// Effective rename-counter seed. The by-item strategy always starts at
    /// 1; the by-type strategies honour the caller-supplied index.
    #[must_use]
    pub const fn counter_seed(self, requested: u32) -> u32 {
        match self {
            Self::ByItem => 1,
            Self::InPlace | Self::InPlaceRename => requested,
        }
    }

    /// Whether this strategy deletes original attachments on full success.
    #[must_use]
    pub const fn deletes_originals(self) -> bool {
        matches!(self, Self::ByItem)
    }

    /// Whether a failed plan halts the remaining transfers. Only the by-item
    /// sequence is dependent; the in-place strategies treat plans as
    /// independent.
    #[must_use]
    pub const fn halts_on_failure(self) -> bool {
        matches!(self, Self::ByItem)
    }

    /// Whether the records are discovered via the per-item N+1 listing
    /// rather than the direct by-type query.
    #[must_use]
    pub const fn fetches_by_item(self) -> bool {
        matches!(self, Self::ByItem)
    }
}

/// Caller-supplied parameters for one migration run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunOptions {
    /// API identifier of the project to operate on.
    pub project: i64,
    /// Attachment item-type identifier; required by the by-type strategies.
    pub item_type: Option<i64>,
    /// Prefix prepended to every computed name.
    pub prefix: String,
    /// Requested counter seed; see [`WriteStrategy::counter_seed`].
    pub start_index: u32,
    /// Remote write sequence to apply.
    pub strategy: WriteStrategy,
    /// Local staging directory for downloaded copies.
    pub staging_dir: PathBuf,
    /// Remove the staging directory after the run.
    pub delete_after_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_item_pins_counter_seed_to_one() {
        assert_eq!(WriteStrategy::ByItem.counter_seed(40), 1);
        assert_eq!(WriteStrategy::InPlace.counter_seed(40), 40);
        assert_eq!(WriteStrategy::InPlaceRename.counter_seed(7), 7);
    }

    #[test]
    fn only_by_item_deletes_and_halts() {
        assert!(WriteStrategy::ByItem.deletes_originals());
        assert!(WriteStrategy::ByItem.halts_on_failure());
        for strategy in [WriteStrategy::InPlace, WriteStrategy::InPlaceRename] {
            assert!(!strategy.deletes_originals());
            assert!(!strategy.halts_on_failure());
        }
    }

    #[test]
    fn strategy_labels_are_stable() {
        assert_eq!(WriteStrategy::ByItem.as_str(), "by_item");
        assert_eq!(WriteStrategy::InPlace.as_str(), "in_place");
        assert_eq!(WriteStrategy::InPlaceRename.as_str(), "in_place_rename");
    }
}
