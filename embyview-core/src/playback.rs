//! Direct-stream URLs for an external player

use embyview_providers::ClientIdentity;
use url::Url;

use crate::error::{Error, Result};
use crate::models::DisplayItem;

/// Parameters of one direct-stream request
#[derive(Debug, Clone)]
pub struct PlaybackRequest<'a> {
    pub item_id: &'a str,
    pub media_source_id: Option<&'a str>,
    pub token: &'a str,
    pub start_ticks: Option<i64>,
}

/// What the player should open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackTarget {
    /// Server stream URL
    Stream(String),
    /// Path stored in a `.strm` pointer file; the player resolves it
    Pointer(String),
}

impl PlaybackTarget {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Stream(url) | Self::Pointer(url) => url,
        }
    }
}

/// `{base}/Videos/{id}/stream?Static=true&MediaSourceId=..&api_key=..[&StartTimeTicks=..]&DeviceId=..&Device=..`
pub fn playback_url(base: &str, request: &PlaybackRequest<'_>, identity: &ClientIdentity) -> Result<String> {
    if request.item_id.is_empty() {
        return Err(Error::InvalidInput("item id is empty".to_string()));
    }

    let mut url = Url::parse(base)
        .map_err(|e| Error::InvalidInput(format!("invalid server url '{base}': {e}")))?;
    url.path_segments_mut()
        .map_err(|()| Error::InvalidInput(format!("server url '{base}' cannot carry a path")))?
        .pop_if_empty()
        .extend(["Videos", request.item_id, "stream"]);

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("Static", "true");
        if let Some(source_id) = request.media_source_id.filter(|id| !id.is_empty()) {
            query.append_pair("MediaSourceId", source_id);
        }
        query.append_pair("api_key", request.token);
        if let Some(ticks) = request.start_ticks.filter(|t| *t > 0) {
            query.append_pair("StartTimeTicks", &ticks.to_string());
        }
        query.append_pair("DeviceId", &identity.device_id);
        query.append_pair("Device", &identity.device);
    }

    Ok(url.into())
}

/// Pick the target for a mapped item, resuming from the saved position when `resume` is set
pub fn resolve_playback(
    item: &DisplayItem,
    base: &str,
    token: &str,
    identity: &ClientIdentity,
    resume: bool,
) -> Result<PlaybackTarget> {
    if item.is_pointer_file {
        return Ok(PlaybackTarget::Pointer(item.pointer_target_path.clone()));
    }
    if !item.is_playable() {
        return Err(Error::InvalidInput(format!("{} '{}' is not playable", item.kind, item.id)));
    }

    let start_ticks = if resume {
        item.user_data
            .as_ref()
            .map(|data| data.playback_position_ticks)
    } else {
        None
    };

    let request = PlaybackRequest {
        item_id: &item.id,
        media_source_id: item.primary_media_source_id(),
        token,
        start_ticks,
    };
    playback_url(base, &request, identity).map(PlaybackTarget::Stream)
}
