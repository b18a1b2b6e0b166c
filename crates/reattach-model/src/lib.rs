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

//! Wire DTOs for the remote requirements-management REST API.
//!
//! These types are shared by the client and the engine so request/response
//! encoding stays deterministic and is tested in one place. Field names
//! follow the remote system's camelCase JSON; serde renames keep the Rust
//! side idiomatic.

use serde::{Deserialize, Serialize};

/// Paginated response envelope returned by the listing endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct RestPage<T> {
    /// Pagination metadata, including the next-page link when more pages exist.
    #[serde(default)]
    pub meta: PageMeta,
    /// Resources contained in this page.
    #[serde(default)]
    pub data: Vec<T>,
}

/// Metadata block attached to every paginated response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PageMeta {
    /// Absolute URL of the next page; absent on the final page.
    #[serde(rename = "nextLink", skip_serializing_if = "Option::is_none")]
    pub next_link: Option<String>,
    /// Offset/size accounting for the current page, when the server sends it.
    #[serde(rename = "pageInfo", skip_serializing_if = "Option::is_none")]
    pub page_info: Option<PageInfo>,
}

/// Offset accounting reported alongside a page of results.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageInfo {
    /// Zero-based offset of the first record in this page.
    #[serde(rename = "startIndex")]
    pub start_index: u64,
    /// Number of records returned in this page.
    #[serde(rename = "resultCount")]
    pub result_count: u64,
    /// Total records matching the query across all pages.
    #[serde(rename = "totalResults")]
    pub total_results: u64,
}

/// An item (or attachment item) resource as returned by the listing
/// endpoints. Attachments are items whose item type is the project's
/// attachment type; their binary content lives behind a separate endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemResource {
    /// Remote identifier of the item.
    pub id: i64,
    /// Item-type identifier, when the endpoint includes it.
    #[serde(rename = "itemType", default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<i64>,
    /// Mutable field bag carried by the item.
    #[serde(default)]
    pub fields: ItemFields,
}

/// Subset of the item field bag consumed by the migration workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ItemFields {
    /// Display name of the item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Stored filename for attachment items; absent on some records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Identifier of the parent item, when item-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<i64>,
}

/// Response to a resource-creation request; the new id rides in `meta`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CreatedResponse {
    /// Creation metadata; tolerated as optional because some deployments
    /// omit it on error-shaped 2xx bodies.
    #[serde(default)]
    pub meta: Option<CreatedMeta>,
}

/// Metadata block of a creation response.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CreatedMeta {
    /// Identifier assigned to the newly created resource.
    #[serde(default)]
    pub id: Option<i64>,
}

/// Body posted to create a placeholder attachment in a project.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreateAttachmentRequest {
    /// Field bag for the new attachment record.
    pub fields: CreateAttachmentFields,
}

/// Fields accepted when creating a placeholder attachment.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreateAttachmentFields {
    /// Display name for the new attachment.
    pub name: String,
    /// Free-text description recorded on the attachment.
    pub description: String,
}

impl CreateAttachmentRequest {
    /// Build the creation payload for a renamed attachment.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            fields: CreateAttachmentFields {
                name: name.into(),
                description: "Attachment renamed and re-uploaded via API.".to_string(),
            },
        }
    }
}

/// Body posted to link an uploaded attachment to an item.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct LinkAttachmentRequest {
    /// Identifier of the attachment to link.
    pub attachment: i64,
}

/// One entry of the batched asynchronous patch request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchPatchEntry {
    /// Item identifiers the operations apply to.
    pub items: Vec<i64>,
    /// JSON-patch style operations to apply to each listed item.
    pub operations: Vec<PatchOperation>,
}

impl BatchPatchEntry {
    /// Build the rename entry used by the in-place rename strategy.
    #[must_use]
    pub fn rename(item_id: i64, new_name: impl Into<String>) -> Self {
        Self {
            items: vec![item_id],
            operations: vec![PatchOperation {
                op: "replace".to_string(),
                path: "/fields/name".to_string(),
                value: new_name.into(),
            }],
        }
    }
}

/// A single JSON-patch style operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatchOperation {
    /// Operation verb (`replace` for renames).
    pub op: String,
    /// Field pointer the operation targets.
    pub path: String,
    /// Replacement value.
    pub value: String,
}

/// Acknowledgement returned by the asynchronous batch patch endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AsyncPatchResponse {
    /// Payload wrapper carrying the work-tracking key.
    #[serde(default)]
    pub data: Option<AsyncPatchData>,
}

/// Payload of a batch patch acknowledgement.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AsyncPatchData {
    /// Opaque identifier for tracking the asynchronous work out of band.
    #[serde(rename = "workKey", default)]
    pub work_key: Option<String>,
}

/// Response body of the OAuth2 client-credentials token endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    /// Bearer token to attach to subsequent requests; treated as missing
    /// when the endpoint returns 2xx without it.
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Error envelope some endpoints return alongside non-2xx statuses.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    /// Error metadata block.
    #[serde(default)]
    pub meta: Option<ErrorMeta>,
}

/// Metadata block of an error envelope.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ErrorMeta {
    /// HTTP-style status echoed in the body.
    #[serde(default)]
    pub status: Option<u16>,
    /// Human-readable error message.
    #[serde(default)]
    pub message: Option<String>,
}
