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

//! Orchestration of one migration run.
//!
//! [`Migrator::run`] drives the phases in a fixed order: discover records,
//! filter and plan, stage downloads, apply the strategy's write sequence,
//! then clean up. Per-plan failures are narrated on the event bus and
//! tallied in the [`RunReport`]; only listing and staging-setup failures
//! abort the run.

mod error;
mod report;

use std::path::Path;

use tracing::{info, warn};

use reattach_client::ApiSession;
use reattach_core::{AttachmentRecord, RenamePlan, RunOptions, WriteStrategy, plan_renames};
use reattach_events::{Event, EventBus};
use reattach_fsops::{StagingArea, remove_staging};
use reattach_model::ItemResource;

pub use error::{EngineError, EngineResult};
pub use report::RunReport;

/// Executes migration runs against one API session.
pub struct Migrator {
    session: ApiSession,
    bus: EventBus,
}

impl Migrator {
    /// Build a migrator over a verified session.
    #[must_use]
    pub const fn new(session: ApiSession, bus: EventBus) -> Self {
        Self { session, bus }
    }

    /// The progress bus this migrator publishes to.
    #[must_use]
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Execute one run and return its report.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the options are inconsistent, the
    /// listing cannot be completed, or the staging directory cannot be
    /// created. Everything after staging setup degrades per plan instead
    /// of failing the run.
    pub async fn run(&self, options: &RunOptions) -> EngineResult<RunReport> {
        self.bus.publish(Event::RunStarted {
            strategy: options.strategy.as_str().to_string(),
            project: options.project,
        });

        let records = self.discover(options).await?;
        let seen = records.len();
        let seed = options.strategy.counter_seed(options.start_index);
        let mut plans = plan_renames(&records, &options.prefix, seed);
        self.bus.publish(Event::RecordsMatched {
            matched: plans.len(),
            seen,
        });
        for plan in &plans {
            if plan.name_split_fallback {
                warn!(attachment_id = plan.attachment_id, "no stored filename");
                self.bus.publish(Event::FilenameMissing {
                    attachment_id: plan.attachment_id,
                });
            }
        }

        let mut report = RunReport::new(seen, plans.len());
        if plans.is_empty() {
            self.bus.publish(Event::NothingToDo);
            self.bus.publish(Event::RunCompleted {
                uploaded: 0,
                failed: 0,
            });
            return Ok(report);
        }

        let staging = StagingArea::prepare(&options.staging_dir)
            .map_err(|source| EngineError::Staging { source })?;

        self.download_phase(&staging, &mut plans, &mut report).await;
        match options.strategy {
            WriteStrategy::ByItem => {
                self.by_item_phase(options.project, &plans, &mut report)
                    .await;
            }
            WriteStrategy::InPlace => self.in_place_phase(&plans, &mut report).await,
            WriteStrategy::InPlaceRename => {
                self.in_place_phase(&plans, &mut report).await;
                self.rename_phase(&plans, &mut report).await;
            }
        }
        self.cleanup_phase(options, staging.root(), &mut report);

        info!(
            uploaded = report.uploaded,
            failed = report.failed,
            "run finished"
        );
        self.bus.publish(Event::RunCompleted {
            uploaded: report.uploaded,
            failed: report.failed,
        });
        Ok(report)
    }

    /// Collect attachment records using the strategy's listing shape.
    async fn discover(&self, options: &RunOptions) -> EngineResult<Vec<AttachmentRecord>> {
        if options.strategy.fetches_by_item() {
            self.discover_by_item(options.project).await
        } else {
            let item_type = options.item_type.ok_or(EngineError::InvalidOptions {
                field: "item_type",
                reason: "is required by the in-place strategies",
            })?;
            self.discover_by_type(options.project, item_type).await
        }
    }

    /// N+1 listing: every item in the project, then each item's attachments.
    /// A 404 on the attachment listing means the item has none; other
    /// per-item failures are narrated and skipped.
    async fn discover_by_item(&self, project: i64) -> EngineResult<Vec<AttachmentRecord>> {
        let mut items = Vec::new();
        let mut cursor = self
            .session
            .project_items(project)
            .map_err(|source| EngineError::Listing { source })?;
        while let Some(page) = cursor
            .try_next()
            .await
            .map_err(|source| EngineError::Listing { source })?
        {
            let records = page.len();
            items.extend(page);
            self.bus.publish(Event::PageFetched {
                records,
                total: items.len(),
            });
        }

        let mut records = Vec::new();
        for item in items {
            match self.session.item_attachments(item.id).await {
                Ok(Some(attachments)) => {
                    records.extend(
                        attachments
                            .into_iter()
                            .filter_map(|resource| to_record(resource, Some(item.id))),
                    );
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(item_id = item.id, "attachment listing failed");
                    self.bus.publish(Event::RecordFetchFailed {
                        item_id: item.id,
                        message: err.detail(),
                    });
                }
            }
        }
        Ok(records)
    }

    /// Direct listing of every item of the attachment type in the project.
    async fn discover_by_type(
        &self,
        project: i64,
        item_type: i64,
    ) -> EngineResult<Vec<AttachmentRecord>> {
        let mut records = Vec::new();
        let mut cursor = self
            .session
            .items_by_type(project, item_type)
            .map_err(|source| EngineError::Listing { source })?;
        while let Some(page) = cursor
            .try_next()
            .await
            .map_err(|source| EngineError::Listing { source })?
        {
            let fetched = page.len();
            records.extend(
                page.into_iter()
                    .filter_map(|resource| to_record(resource, None)),
            );
            self.bus.publish(Event::PageFetched {
                records: fetched,
                total: records.len(),
            });
        }
        Ok(records)
    }

    /// Stage every plan's bytes under its new name. Failed downloads mark
    /// the plan unstaged; later phases skip it.
    async fn download_phase(
        &self,
        staging: &StagingArea,
        plans: &mut [RenamePlan],
        report: &mut RunReport,
    ) {
        for plan in plans.iter_mut() {
            let dest = match staging.file_path(&plan.new_name) {
                Ok(dest) => dest,
                Err(err) => {
                    report.failed += 1;
                    self.bus.publish(Event::DownloadFailed {
                        attachment_id: plan.attachment_id,
                        message: err.detail(),
                    });
                    continue;
                }
            };
            match self
                .session
                .download_attachment(plan.attachment_id, &dest)
                .await
            {
                Ok(_) => {
                    report.downloaded += 1;
                    self.bus.publish(Event::Downloaded {
                        attachment_id: plan.attachment_id,
                        original_name: plan.original_name.clone(),
                        new_name: plan.new_name.clone(),
                    });
                    plan.local_path = Some(dest);
                }
                Err(err) => {
                    report.failed += 1;
                    self.bus.publish(Event::DownloadFailed {
                        attachment_id: plan.attachment_id,
                        message: err.detail(),
                    });
                }
            }
        }
    }

    /// Dependent sequence: create a placeholder, upload into it, link it.
    /// The first failure halts remaining transfers, and the originals are
    /// deleted only when every plan was uploaded and linked.
    async fn by_item_phase(&self, project: i64, plans: &[RenamePlan], report: &mut RunReport) {
        let mut completed = 0usize;
        let mut halted = false;
        for (index, plan) in plans.iter().enumerate() {
            let Some(path) = plan.local_path.as_deref() else {
                continue;
            };
            match self.transfer_by_item(project, plan, path).await {
                Ok(()) => {
                    report.uploaded += 1;
                    report.linked += 1;
                    completed += 1;
                }
                Err(message) => {
                    report.failed += 1;
                    self.bus.publish(Event::TransferFailed {
                        attachment_id: plan.attachment_id,
                        message,
                    });
                    self.bus.publish(Event::TransfersHalted {
                        remaining: plans.len() - index - 1,
                    });
                    halted = true;
                    break;
                }
            }
        }

        if halted || completed != plans.len() {
            report.delete_phase_skipped = true;
            self.bus.publish(Event::DeletePhaseSkipped);
            return;
        }
        for plan in plans {
            let Some(item_id) = plan.item_id else {
                continue;
            };
            match self
                .session
                .delete_item_attachment(item_id, plan.attachment_id)
                .await
            {
                Ok(()) => {
                    report.deleted += 1;
                    self.bus.publish(Event::OriginalDeleted {
                        attachment_id: plan.attachment_id,
                        item_id,
                    });
                }
                Err(err) => {
                    report.failed += 1;
                    self.bus.publish(Event::DeleteFailed {
                        attachment_id: plan.attachment_id,
                        message: err.detail(),
                    });
                }
            }
        }
    }

    async fn transfer_by_item(
        &self,
        project: i64,
        plan: &RenamePlan,
        path: &Path,
    ) -> Result<(), String> {
        let item_id = plan
            .item_id
            .ok_or_else(|| "record has no owning item to link against".to_string())?;
        let placeholder_id = self
            .session
            .create_attachment(project, &plan.new_name)
            .await
            .map_err(|err| err.detail())?;
        self.bus.publish(Event::PlaceholderCreated {
            attachment_id: plan.attachment_id,
            placeholder_id,
        });
        self.session
            .upload_attachment_file(placeholder_id, path, &plan.new_name)
            .await
            .map_err(|err| err.detail())?;
        self.bus.publish(Event::Uploaded {
            attachment_id: placeholder_id,
            new_name: plan.new_name.clone(),
        });
        self.session
            .link_attachment(item_id, placeholder_id)
            .await
            .map_err(|err| err.detail())?;
        self.bus.publish(Event::Linked {
            placeholder_id,
            item_id,
        });
        Ok(())
    }

    /// Independent overwrites of each original attachment's content. Plans
    /// never depend on each other and nothing is deleted.
    async fn in_place_phase(&self, plans: &[RenamePlan], report: &mut RunReport) {
        for plan in plans {
            let Some(path) = plan.local_path.as_deref() else {
                continue;
            };
            match self
                .session
                .upload_attachment_file(plan.attachment_id, path, &plan.new_name)
                .await
            {
                Ok(()) => {
                    report.uploaded += 1;
                    self.bus.publish(Event::Uploaded {
                        attachment_id: plan.attachment_id,
                        new_name: plan.new_name.clone(),
                    });
                }
                Err(err) => {
                    report.failed += 1;
                    self.bus.publish(Event::TransferFailed {
                        attachment_id: plan.attachment_id,
                        message: err.detail(),
                    });
                }
            }
        }
    }

    /// One batched asynchronous rename covering every plan, submitted even
    /// when individual uploads failed so record names stay aligned with the
    /// computed scheme. The acknowledgement's work key is reported, never
    /// polled.
    async fn rename_phase(&self, plans: &[RenamePlan], report: &mut RunReport) {
        let entries: Vec<_> = plans
            .iter()
            .map(|plan| {
                reattach_model::BatchPatchEntry::rename(plan.attachment_id, plan.new_name.clone())
            })
            .collect();
        match self.session.submit_rename_batch(&entries).await {
            Ok(work_key) => {
                info!(work_key = %work_key, "rename batch acknowledged");
                self.bus.publish(Event::RenameSubmitted {
                    work_key: work_key.clone(),
                });
                report.work_key = Some(work_key);
            }
            Err(err) => {
                warn!("rename batch rejected");
                self.bus.publish(Event::RenameFailed {
                    message: err.detail(),
                });
            }
        }
    }

    /// Remove or keep the staging directory. Failures here never fail the
    /// run; the path is reported so the operator can remove it manually.
    fn cleanup_phase(&self, options: &RunOptions, root: &Path, report: &mut RunReport) {
        if options.delete_after_run {
            match remove_staging(root) {
                Ok(_) => {
                    self.bus.publish(Event::CleanupCompleted {
                        path: root.display().to_string(),
                    });
                }
                Err(err) => {
                    warn!(path = %root.display(), "staging cleanup failed");
                    self.bus.publish(Event::CleanupFailed {
                        path: root.display().to_string(),
                        message: err.detail(),
                    });
                    report.staging_dir = Some(root.to_path_buf());
                }
            }
        } else {
            self.bus.publish(Event::StagingKept {
                path: root.display().to_string(),
            });
            report.staging_dir = Some(root.to_path_buf());
        }
    }
}

/// Normalise a listing resource into an attachment record. Resources
/// without a display name cannot be filtered or renamed and are dropped.
fn to_record(resource: ItemResource, item_id: Option<i64>) -> Option<AttachmentRecord> {
    let name = resource.fields.name?;
    Some(AttachmentRecord {
        id: resource.id,
        name,
        filename: resource.fields.filename,
        item_id: item_id.or(resource.fields.parent),
        item_type: resource.item_type,
    })
}
