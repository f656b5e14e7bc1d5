// embyview provider clients
//
// Pure HTTP client for Emby/Jellyfin servers. The paging layer in
// embyview-core consumes these clients through its fetcher seam and never
// talks to reqwest directly.

// HTTP clients
pub mod emby;

pub use emby::error::EmbyError;
pub use emby::{ClientIdentity, EmbyClient, ItemsQuery};
