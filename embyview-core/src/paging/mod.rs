//! Paged item loading
//!
//! - [`PagingSource`] loads one page for one filter
//! - [`PagingController`] turns page loads into an observable, growing list

pub mod controller;
pub mod fetcher;
pub mod source;
pub mod types;

pub use controller::{PagingController, PagingSnapshot, PagingStream, VisibleRangeHook};
#[cfg(test)]
pub use fetcher::MockRemoteItemFetcher;
pub use fetcher::{
    EmbyItemFetcher, ItemFilter, RemoteItemFetcher, ServerContext, SharedToken, StaticToken,
    TokenSource,
};
pub use source::PagingSource;
pub use types::{
    AggregateLoadState, CombinedLoadStates, LoadState, Page, PageKey, PageRequest,
    PageResult, PagingEvent, PagingState, SessionId, VisibleRange,
};
