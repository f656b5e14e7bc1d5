//! Image bytes behind a narrow resolve-URL interface
//!
//! The paging layer only produces URLs; whoever renders them resolves bytes
//! through an [`ImageResolver`]. The cached resolver keeps recent images in
//! memory and collapses concurrent requests for the same URL into one download.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use embyview_providers::EmbyClient;
use moka::future::Cache;

use crate::config::ImageCacheConfig;
use crate::error::FetchError;

#[async_trait]
pub trait ImageResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// Downloads straight from the media server
#[derive(Debug, Clone)]
pub struct EmbyImageResolver {
    client: EmbyClient,
}

impl EmbyImageResolver {
    #[must_use]
    pub const fn new(client: EmbyClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageResolver for EmbyImageResolver {
    async fn resolve(&self, url: &str) -> Result<Bytes, FetchError> {
        Ok(self.client.fetch_image(url).await?)
    }
}

/// In-memory cache in front of another resolver
pub struct CachedImageResolver<R> {
    inner: Arc<R>,
    cache: Cache<String, Bytes>,
}

impl<R> Clone for CachedImageResolver<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            cache: self.cache.clone(),
        }
    }
}

impl<R: ImageResolver + 'static> CachedImageResolver<R> {
    pub fn new(inner: R, config: &ImageCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(Duration::from_secs(config.ttl_seconds))
            .build();

        Self {
            inner: Arc::new(inner),
            cache,
        }
    }
}

#[async_trait]
impl<R: ImageResolver + 'static> ImageResolver for CachedImageResolver<R> {
    async fn resolve(&self, url: &str) -> Result<Bytes, FetchError> {
        if url.is_empty() {
            return Err(FetchError::Config("empty image url".to_string()));
        }

        let inner = Arc::clone(&self.inner);
        let owned = url.to_string();
        // Failed downloads are not cached; the next call tries again
        self.cache
            .try_get_with(url.to_string(), async move { inner.resolve(&owned).await })
            .await
            .map_err(|e| {
                tracing::debug!(url = %url, error = %e, "Image download failed");
                (*e).clone()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingResolver {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ImageResolver for CountingResolver {
        async fn resolve(&self, url: &str) -> Result<Bytes, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(FetchError::Server { status: 404, url: url.to_string() });
            }
            Ok(Bytes::from(url.as_bytes().to_vec()))
        }
    }

    fn resolver(fail: bool) -> CachedImageResolver<CountingResolver> {
        CachedImageResolver::new(
            CountingResolver { calls: AtomicUsize::new(0), fail },
            &ImageCacheConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_coalesced() {
        let cached = resolver(false);
        let url = "http://emby/Items/a/Images/Primary?tag=t";

        let (a, b, c) = tokio::join!(cached.resolve(url), cached.resolve(url), cached.resolve(url));
        assert_eq!(a.unwrap(), Bytes::from(url));
        assert!(b.is_ok() && c.is_ok());
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);

        cached.resolve(url).await.unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cached = resolver(true);
        let url = "http://emby/Items/a/Images/Primary?tag=t";

        assert!(matches!(cached.resolve(url).await, Err(FetchError::Server { status: 404, .. })));
        assert!(cached.resolve(url).await.is_err());
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_url_is_rejected() {
        let cached = resolver(false);
        assert!(matches!(cached.resolve("").await, Err(FetchError::Config(_))));
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 0);
    }
}
