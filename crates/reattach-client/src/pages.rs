//! Lazy cursor over paginated listing endpoints.

use std::marker::PhantomData;

use reqwest::Url;
use serde::de::DeserializeOwned;

use reattach_model::RestPage;

use crate::error::{ApiError, ApiResult};
use crate::session::ApiSession;

/// A cursor that fetches listing pages on demand.
///
/// The first page URL carries the caller's filters; every later page comes
/// from the `meta.nextLink` of the previous response, so server-driven
/// pagination is followed verbatim. No page is fetched until
/// [`PageCursor::try_next`] is called.
pub struct PageCursor<'a, T> {
    session: &'a ApiSession,
    operation: &'static str,
    next: Option<Url>,
    _resource: PhantomData<T>,
}

impl<'a, T: DeserializeOwned> PageCursor<'a, T> {
    pub(crate) const fn new(session: &'a ApiSession, first: Url, operation: &'static str) -> Self {
        Self {
            session,
            operation,
            next: Some(first),
            _resource: PhantomData,
        }
    }

    /// Fetch the next page, or `None` once the listing is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the page request fails, decodes badly, or
    /// the advertised next link is not a valid absolute URL.
    pub async fn try_next(&mut self) -> ApiResult<Option<Vec<T>>> {
        let Some(url) = self.next.take() else {
            return Ok(None);
        };
        let page: RestPage<T> = self.session.get_json(self.operation, url).await?;
        if let Some(link) = &page.meta.next_link {
            let next = Url::parse(link).map_err(|err| ApiError::InvalidUrl {
                operation: self.operation,
                source: err,
            })?;
            self.next = Some(next);
        }
        Ok(Some(page.data))
    }
}
