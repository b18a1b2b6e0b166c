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

//! Authenticated REST client for the attachment API.
//!
//! [`ApiSession::connect`] exchanges credentials (basic or OAuth2 client
//! credentials), verifies them against the projects endpoint, and hands back
//! a session whose methods map one-to-one onto the remote operations the
//! migration needs: paginated listings, streamed downloads, placeholder
//! creation, multipart uploads, linking, deletion, and the batched
//! asynchronous rename.
//!
//! Layout: error.rs (error taxonomy), pages.rs (lazy page cursor),
//! session.rs (session and operations).

mod error;
mod pages;
mod session;

pub use error::{ApiError, ApiResult};
pub use pages::PageCursor;
pub use session::{ApiSession, Credentials, PAGE_SIZE};
