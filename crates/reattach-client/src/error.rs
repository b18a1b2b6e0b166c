//! # Design
//!
//! - Provide structured, constant-message errors for every remote operation.
//! - Capture operation context (endpoint role, HTTP status, server message)
//!   so callers can log actionable lines without string-parsing.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for remote API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors produced by the API session.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Credentials were rejected or the token exchange produced no token.
    #[error("authentication rejected")]
    Auth {
        /// Operation that rejected the credentials.
        operation: &'static str,
        /// HTTP status when the rejection came from the server.
        status: Option<u16>,
        /// Server-provided or synthesized rejection message.
        message: Option<String>,
    },
    /// The request never completed (DNS, TLS, timeout, connection reset).
    #[error("transport failure")]
    Connection {
        /// Operation whose request failed in transit.
        operation: &'static str,
        /// Underlying transport error.
        source: reqwest::Error,
    },
    /// The server answered with a non-success status.
    #[error("request failed")]
    Http {
        /// Operation the server rejected.
        operation: &'static str,
        /// HTTP status code of the response.
        status: u16,
        /// Message extracted from the error envelope, when present.
        message: Option<String>,
    },
    /// The response body did not match the expected shape.
    #[error("response decode failure")]
    Decode {
        /// Operation whose response failed to decode.
        operation: &'static str,
        /// Underlying decode error.
        source: reqwest::Error,
    },
    /// The response decoded but omitted a field the operation depends on.
    #[error("expected field missing from response")]
    MissingField {
        /// Operation whose response was incomplete.
        operation: &'static str,
        /// Dotted path of the missing field.
        field: &'static str,
    },
    /// A URL could not be built or parsed.
    #[error("invalid url")]
    InvalidUrl {
        /// Operation that needed the URL.
        operation: &'static str,
        /// Underlying parse error.
        source: url::ParseError,
    },
    /// Local filesystem failures while streaming a download to disk.
    #[error("local io failure")]
    Io {
        /// Operation that touched the filesystem.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl ApiError {
    /// Whether this is an HTTP 404 from the server.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Http { status: 404, .. })
    }

    /// Human-readable line including the captured context fields.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Auth {
                operation,
                status,
                message,
            } => {
                let reason = message.as_deref().unwrap_or("credentials rejected");
                status.map_or_else(
                    || format!("{operation}: {reason}"),
                    |code| format!("{operation}: HTTP {code}: {reason}"),
                )
            }
            Self::Connection { operation, source } => format!("{operation}: {source}"),
            Self::Http {
                operation,
                status,
                message,
            } => message.as_ref().map_or_else(
                || format!("{operation}: HTTP {status}"),
                |text| format!("{operation}: HTTP {status}: {text}"),
            ),
            Self::Decode { operation, source } => {
                format!("{operation}: unexpected response body: {source}")
            }
            Self::MissingField { operation, field } => {
                format!("{operation}: response omitted {field}")
            }
            Self::InvalidUrl { operation, source } => format!("{operation}: bad url: {source}"),
            Self::Io {
                operation,
                path,
                source,
            } => format!("{operation}: {}: {source}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_matches_only_http_404() {
        let hit = ApiError::Http {
            operation: "list_item_attachments",
            status: 404,
            message: None,
        };
        let miss = ApiError::Http {
            operation: "list_item_attachments",
            status: 500,
            message: None,
        };
        assert!(hit.is_not_found());
        assert!(!miss.is_not_found());
    }

    #[test]
    fn detail_includes_status_and_server_message() {
        let err = ApiError::Http {
            operation: "create_attachment",
            status: 403,
            message: Some("forbidden".to_string()),
        };
        assert_eq!(err.detail(), "create_attachment: HTTP 403: forbidden");
    }

    #[test]
    fn detail_for_auth_without_status_names_the_reason() {
        let err = ApiError::Auth {
            operation: "oauth_token",
            status: None,
            message: Some("token endpoint omitted access_token".to_string()),
        };
        assert_eq!(err.detail(), "oauth_token: token endpoint omitted access_token");
    }
}
