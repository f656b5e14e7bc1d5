use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::FetchError;
use crate::models::DisplayItem;

/// Zero-based page index; `key * page_size` is the server offset
pub type PageKey = u32;

/// Identity of one paging session inside a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// `key == None` means the initial load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub key: Option<PageKey>,
    pub load_size: u32,
}

impl PageRequest {
    #[must_use]
    pub const fn initial(load_size: u32) -> Self {
        Self { key: None, load_size }
    }

    #[must_use]
    pub const fn at(key: PageKey, load_size: u32) -> Self {
        Self { key: Some(key), load_size }
    }
}

/// One loaded page
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub data: Vec<DisplayItem>,
    pub previous_key: Option<PageKey>,
    /// `None` only for an empty page, which ends pagination
    pub next_key: Option<PageKey>,
}

impl Page {
    /// Build the page loaded at `key`, deriving its neighbour keys
    #[must_use]
    pub fn new(key: PageKey, data: Vec<DisplayItem>) -> Self {
        let next_key = if data.is_empty() { None } else { key.checked_add(1) };
        Self {
            previous_key: key.checked_sub(1),
            next_key,
            data,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Outcome of one `PagingSource::load`
#[derive(Debug, Clone, PartialEq)]
pub enum PageResult {
    Page(Page),
    Error(FetchError),
}

/// Load state of one direction
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    NotLoading,
    Loading,
    Error(FetchError),
}

impl LoadState {
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Load states of both directions of a session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CombinedLoadStates {
    pub refresh: LoadState,
    pub append: LoadState,
}

/// Single view of [`CombinedLoadStates`]; refresh wins over append
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateLoadState {
    Idle,
    LoadingInitial,
    LoadingMore,
    ErrorInitial(FetchError),
    ErrorMore(FetchError),
}

impl CombinedLoadStates {
    #[must_use]
    pub fn aggregate(&self) -> AggregateLoadState {
        match (&self.refresh, &self.append) {
            (LoadState::Loading, _) => AggregateLoadState::LoadingInitial,
            (LoadState::Error(e), _) => AggregateLoadState::ErrorInitial(e.clone()),
            (LoadState::NotLoading, LoadState::Loading) => AggregateLoadState::LoadingMore,
            (LoadState::NotLoading, LoadState::Error(e)) => AggregateLoadState::ErrorMore(e.clone()),
            (LoadState::NotLoading, LoadState::NotLoading) => AggregateLoadState::Idle,
        }
    }
}

/// Inclusive range of item indices currently on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleRange {
    pub first: usize,
    pub last: usize,
}

impl VisibleRange {
    #[must_use]
    pub fn new(first: usize, last: usize) -> Self {
        Self {
            first: first.min(last),
            last: first.max(last),
        }
    }
}

/// Loaded pages plus the anchor, as seen by `PagingSource::get_refresh_key`
#[derive(Debug, Clone, Default)]
pub struct PagingState {
    /// In key order
    pub pages: Vec<Arc<Page>>,
    pub anchor_position: Option<usize>,
    pub page_size: u32,
}

impl PagingState {
    /// Page whose cumulative index range contains `anchor`; the last page
    /// when the anchor lies past the loaded items
    #[must_use]
    pub fn closest_page_to_position(&self, anchor: usize) -> Option<&Page> {
        let mut start = 0usize;
        for page in &self.pages {
            let end = start + page.len();
            if anchor < end {
                return Some(page);
            }
            start = end;
        }
        self.pages.last().map(AsRef::as_ref)
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.pages.iter().map(|page| page.len()).sum()
    }
}

/// Change notification for one session
#[derive(Debug, Clone)]
pub enum PagingEvent {
    PageLoaded { key: PageKey, page: Arc<Page> },
    LoadStateChanged(CombinedLoadStates),
    /// Previously delivered pages are gone; observers clear their list
    Invalidated,
}
