pub mod bootstrap;
pub mod config;
pub mod error;
pub mod images;
pub mod logging;
pub mod mapper;
pub mod models;
pub mod paging;
pub mod playback;
pub mod repository;

#[cfg(test)]
pub mod test_helpers;

pub use config::Config;
pub use error::{Error, FetchError, Result};
pub use mapper::map_to_display_item;
pub use models::{DisplayItem, FileFormat, MediaKind};
pub use paging::{ItemFilter, PagingController, PagingEvent, VisibleRange};
pub use repository::MediaRepository;
