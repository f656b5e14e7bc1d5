//! Emby/Jellyfin HTTP client, wire types and errors

pub mod client;
pub mod error;
pub mod types;

pub use client::{ClientIdentity, EmbyClient, ItemsQuery};
pub use error::EmbyError;
