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

//! Strategy-agnostic domain types and the naming filter/renamer for the
//! attachment migration workflow.

pub mod model;
pub mod plan;

pub use model::{AttachmentRecord, RenamePlan, RunOptions, WriteStrategy};
pub use plan::{MATCH_PREFIX, plan_renames, split_file_name};
