use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use embyview_providers::ItemsQuery;
use futures::FutureExt;
use tracing::{debug, warn};

use super::fetcher::{ItemFilter, RemoteItemFetcher, ServerContext};
use super::types::{Page, PageKey, PageRequest, PageResult, PagingState};
use crate::error::FetchError;
use crate::mapper::map_to_display_item;

/// Loads pages for one filter
///
/// Container listings and searches share this type; only the bound
/// [`ItemFilter`] differs.
#[derive(Clone)]
pub struct PagingSource {
    fetcher: Arc<dyn RemoteItemFetcher>,
    filter: ItemFilter,
    context: Arc<ServerContext>,
}

impl PagingSource {
    pub fn new(
        fetcher: Arc<dyn RemoteItemFetcher>,
        filter: ItemFilter,
        context: Arc<ServerContext>,
    ) -> Self {
        Self {
            fetcher,
            filter,
            context,
        }
    }

    #[must_use]
    pub const fn filter(&self) -> &ItemFilter {
        &self.filter
    }

    /// Load one page. Never fails outward: every failure, including a
    /// panicking fetcher, comes back as [`PageResult::Error`].
    pub async fn load(&self, request: PageRequest) -> PageResult {
        let key = request.key.unwrap_or(0);
        let offset = u64::from(key) * u64::from(request.load_size);
        let query = self.filter.apply(ItemsQuery::new(
            self.context.user_id.clone(),
            offset,
            request.load_size,
        ));

        debug!(filter = %self.filter, key, offset, limit = request.load_size, "Loading page");

        let fetched = AssertUnwindSafe(async { self.fetcher.fetch_items(&query).await })
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(FetchError::Internal("item fetcher panicked".to_string())));

        match fetched {
            Ok(response) => {
                let data = response
                    .items
                    .iter()
                    .map(|item| map_to_display_item(item, &self.context.base_url))
                    .collect();
                PageResult::Page(Page::new(key, data))
            }
            Err(e) => {
                warn!(filter = %self.filter, key, error = %e, "Page load failed");
                PageResult::Error(e)
            }
        }
    }

    /// Key to restart from so the anchored item stays loaded
    #[must_use]
    pub fn get_refresh_key(&self, state: &PagingState) -> Option<PageKey> {
        let anchor = state.anchor_position?;
        let page = state.closest_page_to_position(anchor)?;
        page.previous_key
            .map(|key| key.saturating_add(1))
            .or_else(|| page.next_key.map(|key| key.saturating_sub(1)))
    }
}
