//! Authenticated session and the remote operations built on it.

use std::path::Path;

use futures_util::StreamExt;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url, multipart};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use reattach_model::{
    AsyncPatchResponse, BatchPatchEntry, CreateAttachmentRequest, CreatedResponse, ErrorEnvelope,
    ItemResource, LinkAttachmentRequest, RestPage, TokenResponse,
};

use crate::error::{ApiError, ApiResult};
use crate::pages::PageCursor;

/// Records requested per listing page.
pub const PAGE_SIZE: u32 = 20;

/// Credentials accepted by [`ApiSession::connect`].
#[derive(Debug, Clone)]
pub enum Credentials {
    /// HTTP basic authentication, sent with every request.
    Basic {
        /// Account username.
        username: String,
        /// Account password.
        password: String,
    },
    /// OAuth2 client-credentials grant, exchanged once at connect time.
    ClientCredentials {
        /// Registered client identifier.
        client_id: String,
        /// Registered client secret.
        client_secret: String,
    },
}

impl Credentials {
    /// Short label for the authentication method, used in logs.
    #[must_use]
    pub const fn method_label(&self) -> &'static str {
        match self {
            Self::Basic { .. } => "basic",
            Self::ClientCredentials { .. } => "oauth",
        }
    }
}

#[derive(Debug, Clone)]
enum AuthMode {
    Basic { username: String, password: String },
    Bearer { token: String },
}

/// A verified session against one API instance.
///
/// Construction goes through [`ApiSession::connect`], which resolves the
/// credentials into a per-request authorization mode and probes the projects
/// endpoint so credential problems surface before any work starts.
#[derive(Debug, Clone)]
pub struct ApiSession {
    http: Client,
    base: Url,
    auth: AuthMode,
}

impl ApiSession {
    /// Authenticate against the instance at `base` and verify access.
    ///
    /// For client-credentials, the token exchange happens here; a 2xx token
    /// response without an `access_token` is treated as an authentication
    /// failure, not a decode failure.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Auth`] when the credentials are rejected, and
    /// [`ApiError::Connection`] when the instance is unreachable.
    pub async fn connect(http: Client, base: Url, credentials: Credentials) -> ApiResult<Self> {
        let base = normalise_base(base);
        let auth = match credentials {
            Credentials::Basic { username, password } => AuthMode::Basic { username, password },
            Credentials::ClientCredentials {
                client_id,
                client_secret,
            } => {
                let token = fetch_token(&http, &base, &client_id, &client_secret).await?;
                AuthMode::Bearer { token }
            }
        };
        let session = Self { http, base, auth };
        session.probe().await?;
        Ok(session)
    }

    /// Lazy cursor over all items of a project.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when the listing URL cannot be built.
    pub fn project_items(&self, project: i64) -> ApiResult<PageCursor<'_, ItemResource>> {
        let mut url = self.endpoint_v2("items")?;
        url.query_pairs_mut()
            .append_pair("project", &project.to_string())
            .append_pair("startAt", "0")
            .append_pair("maxResults", &PAGE_SIZE.to_string());
        Ok(PageCursor::new(self, url, "list_project_items"))
    }

    /// Lazy cursor over all items of one type across a project.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when the listing URL cannot be built.
    pub fn items_by_type(
        &self,
        project: i64,
        item_type: i64,
    ) -> ApiResult<PageCursor<'_, ItemResource>> {
        let mut url = self.endpoint_v2("abstractitems")?;
        url.query_pairs_mut()
            .append_pair("project", &project.to_string())
            .append_pair("itemType", &item_type.to_string())
            .append_pair("startAt", "0")
            .append_pair("maxResults", &PAGE_SIZE.to_string());
        Ok(PageCursor::new(self, url, "list_items_by_type"))
    }

    /// Attachments linked to one item, or `None` when the server reports
    /// the item has no attachment listing (HTTP 404).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] for any failure other than a 404.
    pub async fn item_attachments(&self, item_id: i64) -> ApiResult<Option<Vec<ItemResource>>> {
        const OPERATION: &str = "list_item_attachments";
        let url = self.endpoint_v2(&format!("items/{item_id}/attachments"))?;
        match self
            .get_json::<RestPage<ItemResource>>(OPERATION, url)
            .await
        {
            Ok(page) => Ok(Some(page.data)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Stream an attachment's bytes to `dest`, returning the byte count.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Io`] when the destination cannot be written and
    /// the usual transport/HTTP variants for the download itself.
    pub async fn download_attachment(&self, attachment_id: i64, dest: &Path) -> ApiResult<u64> {
        const OPERATION: &str = "download_file";
        let url = self.endpoint_v2(&format!("attachments/{attachment_id}/file"))?;
        let response = self.send(OPERATION, self.request(Method::GET, url)).await?;

        let mut file = File::create(dest).await.map_err(|err| ApiError::Io {
            operation: OPERATION,
            path: dest.to_path_buf(),
            source: err,
        })?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| ApiError::Connection {
                operation: OPERATION,
                source: err,
            })?;
            file.write_all(&chunk).await.map_err(|err| ApiError::Io {
                operation: OPERATION,
                path: dest.to_path_buf(),
                source: err,
            })?;
            written = written.saturating_add(u64::try_from(chunk.len()).unwrap_or(u64::MAX));
        }
        file.flush().await.map_err(|err| ApiError::Io {
            operation: OPERATION,
            path: dest.to_path_buf(),
            source: err,
        })?;
        debug!(attachment_id, bytes = written, "attachment staged");
        Ok(written)
    }

    /// Create an empty placeholder attachment in a project, returning its id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MissingField`] when the server accepts the
    /// request but omits the new id.
    pub async fn create_attachment(&self, project: i64, name: &str) -> ApiResult<i64> {
        const OPERATION: &str = "create_attachment";
        let url = self.endpoint_v2(&format!("projects/{project}/attachments"))?;
        let response = self
            .send(
                OPERATION,
                self.request(Method::POST, url)
                    .json(&CreateAttachmentRequest::named(name)),
            )
            .await?;
        let created: CreatedResponse = decode(OPERATION, response).await?;
        created
            .meta
            .and_then(|meta| meta.id)
            .ok_or(ApiError::MissingField {
                operation: OPERATION,
                field: "meta.id",
            })
    }

    /// Replace an attachment's binary content with the file at `path`.
    ///
    /// The bytes are sent as a multipart form under the part name `file`
    /// with an octet-stream content type, matching what the endpoint expects.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Io`] when the staged file cannot be read and the
    /// usual transport/HTTP variants for the upload.
    pub async fn upload_attachment_file(
        &self,
        attachment_id: i64,
        path: &Path,
        file_name: &str,
    ) -> ApiResult<()> {
        const OPERATION: &str = "upload_file";
        let url = self.endpoint_v2(&format!("attachments/{attachment_id}/file"))?;
        let bytes = tokio::fs::read(path).await.map_err(|err| ApiError::Io {
            operation: OPERATION,
            path: path.to_path_buf(),
            source: err,
        })?;
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")
            .map_err(|err| ApiError::Decode {
                operation: OPERATION,
                source: err,
            })?;
        let form = multipart::Form::new().part("file", part);
        self.send(OPERATION, self.request(Method::PUT, url).multipart(form))
            .await?;
        Ok(())
    }

    /// Link an uploaded attachment to an item.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the server rejects the link.
    pub async fn link_attachment(&self, item_id: i64, attachment_id: i64) -> ApiResult<()> {
        const OPERATION: &str = "link_attachment";
        let url = self.endpoint_v2(&format!("items/{item_id}/attachments"))?;
        self.send(
            OPERATION,
            self.request(Method::POST, url).json(&LinkAttachmentRequest {
                attachment: attachment_id,
            }),
        )
        .await?;
        Ok(())
    }

    /// Detach an attachment from an item.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the server rejects the removal.
    pub async fn delete_item_attachment(&self, item_id: i64, attachment_id: i64) -> ApiResult<()> {
        const OPERATION: &str = "delete_item_attachment";
        let url = self.endpoint_v2(&format!("items/{item_id}/attachments/{attachment_id}"))?;
        self.send(OPERATION, self.request(Method::DELETE, url))
            .await?;
        Ok(())
    }

    /// Submit a batched asynchronous rename, returning the work-tracking key.
    ///
    /// The patch is acknowledged before it is applied; the key is for
    /// out-of-band tracking and is never polled here.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MissingField`] when the acknowledgement omits
    /// the work key.
    pub async fn submit_rename_batch(&self, entries: &[BatchPatchEntry]) -> ApiResult<String> {
        const OPERATION: &str = "batch_rename";
        let url = self.endpoint_v1("items")?;
        let response = self
            .send(OPERATION, self.request(Method::PATCH, url).json(&entries))
            .await?;
        let ack: AsyncPatchResponse = decode(OPERATION, response).await?;
        ack.data
            .and_then(|data| data.work_key)
            .ok_or(ApiError::MissingField {
                operation: OPERATION,
                field: "data.workKey",
            })
    }

    async fn probe(&self) -> ApiResult<()> {
        const OPERATION: &str = "auth_probe";
        let mut url = self.endpoint_v2("projects")?;
        url.query_pairs_mut().append_pair("maxResults", "1");
        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(|err| ApiError::Connection {
                operation: OPERATION,
                source: err,
            })?;
        let status = response.status();
        if status.is_success() {
            debug!("credentials verified");
            Ok(())
        } else {
            Err(ApiError::Auth {
                operation: OPERATION,
                status: Some(status.as_u16()),
                message: read_error_message(response).await,
            })
        }
    }

    pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
    ) -> ApiResult<T> {
        let response = self.send(operation, self.request(Method::GET, url)).await?;
        decode(operation, response).await
    }

    async fn send(&self, operation: &'static str, builder: RequestBuilder) -> ApiResult<Response> {
        let response = builder.send().await.map_err(|err| ApiError::Connection {
            operation,
            source: err,
        })?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(http_error(operation, status, response).await)
        }
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.auth {
            AuthMode::Basic { username, password } => builder.basic_auth(username, Some(password)),
            AuthMode::Bearer { token } => builder.bearer_auth(token),
        }
    }

    fn endpoint_v1(&self, path: &str) -> ApiResult<Url> {
        self.join(&format!("rest/v1/{path}"))
    }

    fn endpoint_v2(&self, path: &str) -> ApiResult<Url> {
        self.join(&format!("rest/v2/{path}"))
    }

    fn join(&self, relative: &str) -> ApiResult<Url> {
        self.base
            .join(relative)
            .map_err(|err| ApiError::InvalidUrl {
                operation: "build_url",
                source: err,
            })
    }
}

async fn fetch_token(
    http: &Client,
    base: &Url,
    client_id: &str,
    client_secret: &str,
) -> ApiResult<String> {
    const OPERATION: &str = "oauth_token";
    let url = base
        .join("rest/oauth/token")
        .map_err(|err| ApiError::InvalidUrl {
            operation: OPERATION,
            source: err,
        })?;
    let response = http
        .post(url)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ])
        .send()
        .await
        .map_err(|err| ApiError::Connection {
            operation: OPERATION,
            source: err,
        })?;
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::Auth {
            operation: OPERATION,
            status: Some(status.as_u16()),
            message: read_error_message(response).await,
        });
    }
    let token: TokenResponse = decode(OPERATION, response).await?;
    token
        .access_token
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::Auth {
            operation: OPERATION,
            status: None,
            message: Some("token endpoint omitted access_token".to_string()),
        })
}

async fn decode<T: serde::de::DeserializeOwned>(
    operation: &'static str,
    response: Response,
) -> ApiResult<T> {
    response
        .json()
        .await
        .map_err(|err| ApiError::Decode { operation, source: err })
}

async fn http_error(operation: &'static str, status: StatusCode, response: Response) -> ApiError {
    ApiError::Http {
        operation,
        status: status.as_u16(),
        message: read_error_message(response).await,
    }
}

/// Best-effort extraction of a server error message: prefer the structured
/// envelope's `meta.message`, fall back to the raw body text.
async fn read_error_message(response: Response) -> Option<String> {
    let bytes = response.bytes().await.unwrap_or_default();
    if bytes.is_empty() {
        return None;
    }
    if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(&bytes) {
        if let Some(message) = envelope.meta.and_then(|meta| meta.message) {
            return Some(message);
        }
    }
    let text = String::from_utf8_lossy(&bytes).trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// The base must end in `/` for relative joins to keep the instance's
/// context path (e.g. `https://host/rm/`).
fn normalise_base(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}
