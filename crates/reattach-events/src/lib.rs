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

//! Typed progress events for the migration workflow.
//!
//! The engine narrates a run through this bus instead of printing, so the
//! same orchestration serves a console subscriber, a test harness, or any
//! other sink. Internally it uses `tokio::broadcast`; subscribers that fall
//! behind lose the oldest events, which is acceptable for a progress log.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::sync::broadcast::{Receiver, Sender};

/// Identifier assigned to each event emitted during a run.
pub type EventId = u64;

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 1_024;

/// Progress events surfaced while a migration run executes.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A run began against the given project.
    RunStarted {
        /// Strategy label (`by_item`, `in_place`, `in_place_rename`).
        strategy: String,
        /// API identifier of the target project.
        project: i64,
    },
    /// Credentials were accepted by the probe call.
    AuthVerified {
        /// Authentication method label (`basic` or `oauth`).
        method: String,
    },
    /// One page of a listing arrived.
    PageFetched {
        /// Records contained in the page.
        records: usize,
        /// Records accumulated so far, this page included.
        total: usize,
    },
    /// A per-item attachment lookup failed with a non-404 error; the record
    /// is skipped and the run continues.
    RecordFetchFailed {
        /// Identifier of the item whose attachments could not be listed.
        item_id: i64,
        /// Human-readable failure description.
        message: String,
    },
    /// Filtering finished.
    RecordsMatched {
        /// Records selected for renaming.
        matched: usize,
        /// Records inspected in total.
        seen: usize,
    },
    /// A matching record has no stored filename; the new name was split from
    /// the display name, which may lose the original extension.
    FilenameMissing {
        /// Identifier of the affected attachment.
        attachment_id: i64,
    },
    /// An original attachment's bytes were staged under the new name.
    Downloaded {
        /// Identifier of the source attachment.
        attachment_id: i64,
        /// Display name before the rename.
        original_name: String,
        /// Staged file name.
        new_name: String,
    },
    /// A download failed; the plan is skipped for all later steps.
    DownloadFailed {
        /// Identifier of the source attachment.
        attachment_id: i64,
        /// Human-readable failure description.
        message: String,
    },
    /// A placeholder attachment record was created in the project.
    PlaceholderCreated {
        /// Identifier of the original attachment.
        attachment_id: i64,
        /// Identifier of the new placeholder.
        placeholder_id: i64,
    },
    /// Staged bytes were uploaded to the remote attachment.
    Uploaded {
        /// Identifier of the attachment that received the bytes.
        attachment_id: i64,
        /// Name of the uploaded file.
        new_name: String,
    },
    /// A placeholder was linked to the original's owning item.
    Linked {
        /// Identifier of the placeholder attachment.
        placeholder_id: i64,
        /// Identifier of the owning item.
        item_id: i64,
    },
    /// A create/upload/link step failed.
    TransferFailed {
        /// Identifier of the original attachment being processed.
        attachment_id: i64,
        /// Human-readable failure description.
        message: String,
    },
    /// The dependent strategy halted; the listed number of plans were never
    /// attempted.
    TransfersHalted {
        /// Plans left untried after the halt.
        remaining: usize,
    },
    /// An original attachment was deleted from its owning item.
    OriginalDeleted {
        /// Identifier of the deleted attachment.
        attachment_id: i64,
        /// Identifier of the owning item.
        item_id: i64,
    },
    /// Deleting one original failed; remaining deletions still proceed.
    DeleteFailed {
        /// Identifier of the attachment that could not be deleted.
        attachment_id: i64,
        /// Human-readable failure description.
        message: String,
    },
    /// The delete phase was suppressed because not every plan was uploaded
    /// and linked. Placeholders already created are left in place.
    DeletePhaseSkipped,
    /// The batched asynchronous rename was acknowledged.
    RenameSubmitted {
        /// Work-tracking identifier returned by the remote system; it is
        /// reported but never polled.
        work_key: String,
    },
    /// The batched asynchronous rename request failed.
    RenameFailed {
        /// Human-readable failure description.
        message: String,
    },
    /// The staging directory was removed.
    CleanupCompleted {
        /// Path that was removed.
        path: String,
    },
    /// Removing the staging directory failed; the run is unaffected.
    CleanupFailed {
        /// Path that should be removed manually.
        path: String,
        /// Human-readable failure description.
        message: String,
    },
    /// The staging directory was deliberately kept.
    StagingKept {
        /// Path of the retained directory.
        path: String,
    },
    /// No records matched the naming convention; nothing was written.
    NothingToDo,
    /// The run finished.
    RunCompleted {
        /// Plans whose upload step succeeded.
        uploaded: usize,
        /// Plans that failed at any step.
        failed: usize,
    },
}

impl Event {
    /// Machine-friendly discriminator for subscribers that filter by kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::AuthVerified { .. } => "auth_verified",
            Self::PageFetched { .. } => "page_fetched",
            Self::RecordFetchFailed { .. } => "record_fetch_failed",
            Self::RecordsMatched { .. } => "records_matched",
            Self::FilenameMissing { .. } => "filename_missing",
            Self::Downloaded { .. } => "downloaded",
            Self::DownloadFailed { .. } => "download_failed",
            Self::PlaceholderCreated { .. } => "placeholder_created",
            Self::Uploaded { .. } => "uploaded",
            Self::Linked { .. } => "linked",
            Self::TransferFailed { .. } => "transfer_failed",
            Self::TransfersHalted { .. } => "transfers_halted",
            Self::OriginalDeleted { .. } => "original_deleted",
            Self::DeleteFailed { .. } => "delete_failed",
            Self::DeletePhaseSkipped => "delete_phase_skipped",
            Self::RenameSubmitted { .. } => "rename_submitted",
            Self::RenameFailed { .. } => "rename_failed",
            Self::CleanupCompleted { .. } => "cleanup_completed",
            Self::CleanupFailed { .. } => "cleanup_failed",
            Self::StagingKept { .. } => "staging_kept",
            Self::NothingToDo => "nothing_to_do",
            Self::RunCompleted { .. } => "run_completed",
        }
    }

    /// Human-readable log line for console subscribers.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::RunStarted { strategy, project } => {
                format!("starting {strategy} run against project {project}")
            }
            Self::AuthVerified { method } => {
                format!("authentication check passed ({method})")
            }
            Self::PageFetched { records, total } => {
                format!("fetched page of {records} records ({total} so far)")
            }
            Self::RecordFetchFailed { item_id, message } => {
                format!("failed to list attachments for item {item_id}: {message}")
            }
            Self::RecordsMatched { matched, seen } => {
                format!("{matched} of {seen} records match the 'image' prefix")
            }
            Self::FilenameMissing { attachment_id } => format!(
                "warning: attachment {attachment_id} has no stored filename; \
                 splitting its display name instead"
            ),
            Self::Downloaded {
                attachment_id,
                original_name,
                new_name,
            } => format!("downloaded '{original_name}' ({attachment_id}) as '{new_name}'"),
            Self::DownloadFailed {
                attachment_id,
                message,
            } => format!("failed to download attachment {attachment_id}: {message}"),
            Self::PlaceholderCreated {
                attachment_id,
                placeholder_id,
            } => format!(
                "created placeholder {placeholder_id} for attachment {attachment_id}"
            ),
            Self::Uploaded {
                attachment_id,
                new_name,
            } => format!("uploaded '{new_name}' to attachment {attachment_id}"),
            Self::Linked {
                placeholder_id,
                item_id,
            } => format!("linked attachment {placeholder_id} to item {item_id}"),
            Self::TransferFailed {
                attachment_id,
                message,
            } => format!("transfer failed for attachment {attachment_id}: {message}"),
            Self::TransfersHalted { remaining } => {
                format!("halting transfers; {remaining} plans left untried")
            }
            Self::OriginalDeleted {
                attachment_id,
                item_id,
            } => format!("deleted original attachment {attachment_id} from item {item_id}"),
            Self::DeleteFailed {
                attachment_id,
                message,
            } => format!(
                "failed to delete original attachment {attachment_id}: {message}; \
                 it may remain on the item"
            ),
            Self::DeletePhaseSkipped => {
                "skipping deletion of originals; not every plan was uploaded and linked"
                    .to_string()
            }
            Self::RenameSubmitted { work_key } => {
                format!("batched rename submitted; work key {work_key}")
            }
            Self::RenameFailed { message } => {
                format!("batched rename request failed: {message}")
            }
            Self::CleanupCompleted { path } => {
                format!("removed staging directory {path}")
            }
            Self::CleanupFailed { path, message } => format!(
                "failed to remove staging directory {path}: {message}; \
                 please remove it manually"
            ),
            Self::StagingKept { path } => {
                format!("staging directory {path} left in place")
            }
            Self::NothingToDo => {
                "no attachments match the naming convention; nothing to do".to_string()
            }
            Self::RunCompleted { uploaded, failed } => {
                format!("run complete: {uploaded} uploaded, {failed} failed")
            }
        }
    }
}

/// Metadata wrapper around events: sequential id plus emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier, starting at 1 for each bus.
    pub id: EventId,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// The event payload.
    pub event: Event,
}

/// Shared progress bus built on `tokio::broadcast`.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    /// Construct a bus with the provided channel capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "event bus capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Construct a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Publish an event, assigning it the next sequential identifier.
    /// Events published with no live subscribers are dropped silently.
    pub fn publish(&self, event: Event) -> EventId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };
        let _ = self.sender.send(envelope);
        id
    }

    /// Subscribe to events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<EventEnvelope> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
