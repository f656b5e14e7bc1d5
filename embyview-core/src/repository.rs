//! Entry point for paged listings

use std::sync::Arc;

use crate::config::PagingConfig;
use crate::paging::{ItemFilter, PagingController, RemoteItemFetcher, ServerContext};

/// Hands out one independent [`PagingController`] per listing
///
/// Controllers created here share only the fetcher and the read-only server
/// context; each has its own sessions, pages and load states.
#[derive(Clone)]
pub struct MediaRepository {
    fetcher: Arc<dyn RemoteItemFetcher>,
    context: Arc<ServerContext>,
    config: PagingConfig,
}

impl MediaRepository {
    pub fn new(
        fetcher: Arc<dyn RemoteItemFetcher>,
        context: ServerContext,
        config: PagingConfig,
    ) -> Self {
        Self {
            fetcher,
            context: Arc::new(context),
            config,
        }
    }

    /// Idle controller; pick a listing with `stream` or `set_filter`
    #[must_use]
    pub fn controller(&self) -> PagingController {
        PagingController::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.context),
            self.config,
        )
    }

    /// Items below `parent_id`, or the whole library for `None`
    #[must_use]
    pub fn media_items(&self, parent_id: Option<&str>) -> PagingController {
        let controller = self.controller();
        controller.set_filter(ItemFilter::container(parent_id));
        controller
    }

    /// Items matching `query`
    #[must_use]
    pub fn search_items(&self, query: &str) -> PagingController {
        let controller = self.controller();
        controller.set_filter(ItemFilter::search(query));
        controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paging::{LoadState, MockRemoteItemFetcher};
    use crate::test_helpers::{items_response, wait_for_states};
    use embyview_providers::ItemsQuery;
    use mockall::predicate::function;

    #[tokio::test]
    async fn test_listings_are_independent() {
        let mut mock = MockRemoteItemFetcher::new();
        mock.expect_fetch_items()
            .with(function(|q: &ItemsQuery| q.parent_id.as_deref() == Some("42")))
            .times(1)
            .returning(|_| Ok(items_response(0, 5)));
        mock.expect_fetch_items()
            .with(function(|q: &ItemsQuery| q.search_term.as_deref() == Some("test")))
            .times(1)
            .returning(|_| Ok(items_response(100, 2)));

        let repository = MediaRepository::new(
            Arc::new(mock),
            ServerContext::new("http://emby/emby", "u1"),
            PagingConfig::default(),
        );

        let browse = repository.media_items(Some("42"));
        let search = repository.search_items("test");
        wait_for_states(&browse, |s| s.refresh == LoadState::NotLoading).await;
        wait_for_states(&search, |s| s.refresh == LoadState::NotLoading).await;

        assert_eq!(browse.snapshot().items.len(), 5);
        assert_eq!(search.snapshot().items.len(), 2);
        assert_ne!(browse.snapshot().items[0].id, search.snapshot().items[0].id);
    }
}
