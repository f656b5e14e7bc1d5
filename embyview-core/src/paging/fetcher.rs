//! Boundary between the paging layer and the media server

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use embyview_providers::emby::types::ItemsResponse;
use embyview_providers::{EmbyClient, ItemsQuery};
use parking_lot::RwLock;

use crate::error::FetchError;

/// Fetch one page of wire items
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteItemFetcher: Send + Sync {
    async fn fetch_items(&self, query: &ItemsQuery) -> Result<ItemsResponse, FetchError>;
}

/// What a paging session lists
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemFilter {
    /// Everything below a container; `None` lists the whole library
    Container { parent_id: Option<String> },
    Search { term: String },
}

impl ItemFilter {
    #[must_use]
    pub fn container(parent_id: Option<impl Into<String>>) -> Self {
        Self::Container {
            parent_id: parent_id.map(Into::into),
        }
    }

    #[must_use]
    pub fn search(term: impl Into<String>) -> Self {
        Self::Search { term: term.into() }
    }

    /// Narrow a base query to this filter
    #[must_use]
    pub fn apply(&self, query: ItemsQuery) -> ItemsQuery {
        match self {
            Self::Container { parent_id: Some(id) } => query.with_parent(id.clone()),
            Self::Container { parent_id: None } => query,
            Self::Search { term } => query.with_search_term(term.clone()),
        }
    }
}

impl fmt::Display for ItemFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Container { parent_id: Some(id) } => write!(f, "container:{id}"),
            Self::Container { parent_id: None } => f.write_str("container:*"),
            Self::Search { term } => write!(f, "search:{term}"),
        }
    }
}

/// Read-only server facts a session is built with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerContext {
    /// API base (host plus `/emby` or `/jellyfin`) that image URLs hang off
    pub base_url: String,
    pub user_id: String,
}

impl ServerContext {
    #[must_use]
    pub fn new(base_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_id: user_id.into(),
        }
    }
}

/// Current access token, owned by whoever manages login
pub trait TokenSource: Send + Sync {
    fn current_token(&self) -> Option<String>;
}

/// Token fixed at startup
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenSource for StaticToken {
    fn current_token(&self) -> Option<String> {
        Some(self.0.clone()).filter(|t| !t.is_empty())
    }
}

/// Token that can be replaced after a new login
#[derive(Debug, Clone, Default)]
pub struct SharedToken(Arc<RwLock<Option<String>>>);

impl SharedToken {
    pub fn set(&self, token: impl Into<String>) {
        *self.0.write() = Some(token.into());
    }

    pub fn clear(&self) {
        *self.0.write() = None;
    }
}

impl TokenSource for SharedToken {
    fn current_token(&self) -> Option<String> {
        self.0.read().clone()
    }
}

/// Fetcher backed by [`EmbyClient`]
///
/// Each call clones the template client (sharing its connection pool) and
/// applies the token current at that moment.
pub struct EmbyItemFetcher {
    template: EmbyClient,
    tokens: Arc<dyn TokenSource>,
}

impl EmbyItemFetcher {
    pub fn new(template: EmbyClient, tokens: Arc<dyn TokenSource>) -> Self {
        Self { template, tokens }
    }

    #[must_use]
    pub fn api_base(&self) -> String {
        self.template.api_base()
    }
}

#[async_trait]
impl RemoteItemFetcher for EmbyItemFetcher {
    async fn fetch_items(&self, query: &ItemsQuery) -> Result<ItemsResponse, FetchError> {
        let token = self
            .tokens
            .current_token()
            .ok_or_else(|| FetchError::Unauthorized("no access token".to_string()))?;

        let mut client = self.template.clone();
        client.set_credentials(token, query.user_id.clone());
        Ok(client.get_items_page(query).await?)
    }
}
