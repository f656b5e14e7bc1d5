//! Emby/Jellyfin API Data Structures
//!
//! Every field the server may omit carries a default so a sparse record still
//! decodes. `null` is treated the same as a missing field.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Decode one field, substituting `T::default()` for `null` or a value of the
/// wrong type. Only this field is affected; the rest of the record survives.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(T::default());
    }
    Ok(T::deserialize(value).unwrap_or_else(|e| {
        debug!(error = %e, "Unexpected field type, using default");
        T::default()
    }))
}

/// Authentication response
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    #[serde(rename = "AccessToken")]
    pub access_token: String,
    #[serde(rename = "User")]
    pub user: User,
    #[serde(rename = "ServerId", default)]
    pub server_id: Option<String>,
}

/// User information (for authentication response)
#[derive(Debug, Deserialize)]
pub struct User {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
}

/// User information (detailed)
#[derive(Debug, Deserialize)]
pub struct UserInfo {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "ServerId", default)]
    pub server_id: String,
}

/// Media item as returned by `/Users/{id}/Items`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "Id", default, deserialize_with = "lenient")]
    pub id: String,
    #[serde(rename = "Name", default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(rename = "ServerId", default, deserialize_with = "lenient")]
    pub server_id: String,
    #[serde(rename = "Type", default, deserialize_with = "lenient")]
    pub item_type: String,
    #[serde(rename = "MediaType", default, deserialize_with = "lenient")]
    pub media_type: Option<String>,
    #[serde(rename = "IsFolder", default, deserialize_with = "lenient")]
    pub is_folder: bool,
    #[serde(rename = "ParentId", default, deserialize_with = "lenient")]
    pub parent_id: Option<String>,
    #[serde(rename = "CollectionType", default, deserialize_with = "lenient")]
    pub collection_type: Option<String>,
    #[serde(rename = "Overview", default, deserialize_with = "lenient")]
    pub overview: Option<String>,
    #[serde(rename = "ProductionYear", default, deserialize_with = "lenient")]
    pub production_year: Option<i32>,
    #[serde(rename = "PremiereDate", default, deserialize_with = "lenient")]
    pub premiere_date: Option<String>,
    #[serde(rename = "RunTimeTicks", default, deserialize_with = "lenient")]
    pub run_time_ticks: Option<i64>,
    #[serde(rename = "Path", default, deserialize_with = "lenient")]
    pub path: Option<String>,
    #[serde(rename = "Container", default, deserialize_with = "lenient")]
    pub container: Option<String>,
    #[serde(rename = "SeriesName", default, deserialize_with = "lenient")]
    pub series_name: Option<String>,
    #[serde(rename = "SeriesId", default, deserialize_with = "lenient")]
    pub series_id: Option<String>,
    #[serde(rename = "SeasonName", default, deserialize_with = "lenient")]
    pub season_name: Option<String>,
    #[serde(rename = "SeasonId", default, deserialize_with = "lenient")]
    pub season_id: Option<String>,
    #[serde(rename = "Album", default, deserialize_with = "lenient")]
    pub album: Option<String>,
    /// Episode number within the season
    #[serde(rename = "IndexNumber", default, deserialize_with = "lenient")]
    pub index_number: Option<i32>,
    /// Season number
    #[serde(rename = "ParentIndexNumber", default, deserialize_with = "lenient")]
    pub parent_index_number: Option<i32>,
    #[serde(rename = "CommunityRating", default, deserialize_with = "lenient")]
    pub community_rating: Option<f64>,
    #[serde(rename = "OfficialRating", default, deserialize_with = "lenient")]
    pub official_rating: Option<String>,
    #[serde(rename = "ImageTags", default, deserialize_with = "lenient")]
    pub image_tags: HashMap<String, String>,
    #[serde(rename = "BackdropImageTags", default, deserialize_with = "lenient")]
    pub backdrop_image_tags: Vec<String>,
    #[serde(rename = "MediaSources", default, deserialize_with = "lenient")]
    pub media_sources: Vec<MediaSource>,
    #[serde(rename = "Chapters", default, deserialize_with = "lenient")]
    pub chapters: Vec<Chapter>,
    #[serde(rename = "UserData", default, deserialize_with = "lenient")]
    pub user_data: Option<UserData>,
}

impl Item {
    /// Decode one item. Fields of the wrong type fall back to their defaults
    /// individually; only a record that is not an object at all is replaced
    /// by an empty item.
    #[must_use]
    pub fn from_value_lenient(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(error = %e, "Malformed item record, using defaults");
            Self::default()
        })
    }

    /// First media source, which the server lists as the preferred one
    #[must_use]
    pub fn primary_media_source(&self) -> Option<&MediaSource> {
        self.media_sources.first()
    }
}

/// Items response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemsResponse {
    pub items: Vec<Item>,
    /// Informational only; the paging layer stops on an empty page
    pub total_record_count: u64,
    pub start_index: u64,
}

/// Raw envelope; items are decoded one by one so a single bad record cannot
/// fail the page
#[derive(Debug, Deserialize)]
pub(crate) struct RawItemsResponse {
    #[serde(rename = "Items", default, deserialize_with = "lenient")]
    pub items: Vec<Value>,
    #[serde(rename = "TotalRecordCount", default, deserialize_with = "lenient")]
    pub total_record_count: u64,
    #[serde(rename = "StartIndex", default, deserialize_with = "lenient")]
    pub start_index: u64,
}

impl From<RawItemsResponse> for ItemsResponse {
    fn from(raw: RawItemsResponse) -> Self {
        Self {
            items: raw.items.into_iter().map(Item::from_value_lenient).collect(),
            total_record_count: raw.total_record_count,
            start_index: raw.start_index,
        }
    }
}

/// Media source attached to an item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaSource {
    #[serde(rename = "Id", default, deserialize_with = "lenient")]
    pub id: String,
    #[serde(rename = "Name", default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(rename = "Path", default, deserialize_with = "lenient")]
    pub path: String,
    #[serde(rename = "Protocol", default, deserialize_with = "lenient")]
    pub protocol: String,
    #[serde(rename = "Container", default, deserialize_with = "lenient")]
    pub container: String,
    #[serde(rename = "Size", default, deserialize_with = "lenient")]
    pub size: i64,
    #[serde(rename = "IsRemote", default, deserialize_with = "lenient")]
    pub is_remote: bool,
    #[serde(rename = "RunTimeTicks", default, deserialize_with = "lenient")]
    pub run_time_ticks: Option<i64>,
    #[serde(rename = "SupportsTranscoding", default, deserialize_with = "lenient")]
    pub supports_transcoding: bool,
    #[serde(rename = "SupportsDirectStream", default, deserialize_with = "lenient")]
    pub supports_direct_stream: bool,
    #[serde(rename = "SupportsDirectPlay", default, deserialize_with = "lenient")]
    pub supports_direct_play: bool,
    #[serde(rename = "IsInfiniteStream", default, deserialize_with = "lenient")]
    pub is_infinite_stream: bool,
    #[serde(rename = "RequiresOpening", default, deserialize_with = "lenient")]
    pub requires_opening: bool,
    #[serde(rename = "DefaultAudioStreamIndex", default, deserialize_with = "lenient")]
    pub default_audio_stream_index: Option<i32>,
    #[serde(rename = "DefaultSubtitleStreamIndex", default, deserialize_with = "lenient")]
    pub default_subtitle_stream_index: Option<i32>,
    #[serde(rename = "MediaStreams", default, deserialize_with = "lenient")]
    pub media_streams: Vec<MediaStream>,
    #[serde(rename = "DirectStreamUrl", default, deserialize_with = "lenient")]
    pub direct_stream_url: Option<String>,
    #[serde(rename = "TranscodingUrl", default, deserialize_with = "lenient")]
    pub transcoding_url: Option<String>,
}

impl MediaSource {
    /// First video stream, if any
    pub fn video_stream(&self) -> Option<&MediaStream> {
        self.media_streams.iter().find(|s| s.is_video())
    }

    pub fn audio_streams(&self) -> impl Iterator<Item = &MediaStream> {
        self.media_streams.iter().filter(|s| s.is_audio())
    }

    pub fn subtitle_streams(&self) -> impl Iterator<Item = &MediaStream> {
        self.media_streams.iter().filter(|s| s.is_subtitle())
    }
}

/// Media stream (video/audio/subtitle)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaStream {
    #[serde(rename = "Index", default, deserialize_with = "lenient")]
    pub index: i32,
    #[serde(rename = "Type", default, deserialize_with = "lenient")]
    pub stream_type: String,
    #[serde(rename = "Codec", default, deserialize_with = "lenient")]
    pub codec: String,
    #[serde(rename = "Language", default, deserialize_with = "lenient")]
    pub language: Option<String>,
    #[serde(rename = "Title", default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(rename = "DisplayTitle", default, deserialize_with = "lenient")]
    pub display_title: Option<String>,
    #[serde(rename = "IsDefault", default, deserialize_with = "lenient")]
    pub is_default: bool,
    #[serde(rename = "IsForced", default, deserialize_with = "lenient")]
    pub is_forced: bool,
    #[serde(rename = "IsExternal", default, deserialize_with = "lenient")]
    pub is_external: bool,
    #[serde(rename = "Width", default, deserialize_with = "lenient")]
    pub width: Option<u32>,
    #[serde(rename = "Height", default, deserialize_with = "lenient")]
    pub height: Option<u32>,
    #[serde(rename = "AspectRatio", default, deserialize_with = "lenient")]
    pub aspect_ratio: Option<String>,
    #[serde(rename = "AverageFrameRate", default, deserialize_with = "lenient")]
    pub average_frame_rate: Option<f32>,
    #[serde(rename = "Profile", default, deserialize_with = "lenient")]
    pub profile: Option<String>,
    #[serde(rename = "Level", default, deserialize_with = "lenient")]
    pub level: Option<f64>,
    #[serde(rename = "BitRate", default, deserialize_with = "lenient")]
    pub bit_rate: Option<i64>,
    #[serde(rename = "Channels", default, deserialize_with = "lenient")]
    pub channels: Option<u32>,
    #[serde(rename = "SampleRate", default, deserialize_with = "lenient")]
    pub sample_rate: Option<u32>,
    #[serde(rename = "BitDepth", default, deserialize_with = "lenient")]
    pub bit_depth: Option<u32>,
    #[serde(rename = "DeliveryUrl", default, deserialize_with = "lenient")]
    pub delivery_url: Option<String>,
}

impl MediaStream {
    #[must_use]
    pub fn is_video(&self) -> bool {
        self.stream_type == "Video"
    }

    #[must_use]
    pub fn is_audio(&self) -> bool {
        self.stream_type == "Audio"
    }

    #[must_use]
    pub fn is_subtitle(&self) -> bool {
        self.stream_type == "Subtitle"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    #[serde(rename = "StartPositionTicks", default, deserialize_with = "lenient")]
    pub start_position_ticks: i64,
    #[serde(rename = "Name", default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(rename = "ImageTag", default, deserialize_with = "lenient")]
    pub image_tag: Option<String>,
}

/// Per-user playback and favorite state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    #[serde(rename = "Rating", default, deserialize_with = "lenient")]
    pub rating: Option<f64>,
    #[serde(rename = "PlayedPercentage", default, deserialize_with = "lenient")]
    pub played_percentage: Option<f64>,
    #[serde(rename = "UnplayedItemCount", default, deserialize_with = "lenient")]
    pub unplayed_item_count: Option<i32>,
    #[serde(rename = "PlaybackPositionTicks", default, deserialize_with = "lenient")]
    pub playback_position_ticks: i64,
    #[serde(rename = "PlayCount", default, deserialize_with = "lenient")]
    pub play_count: i32,
    #[serde(rename = "IsFavorite", default, deserialize_with = "lenient")]
    pub is_favorite: bool,
    #[serde(rename = "Likes", default, deserialize_with = "lenient")]
    pub likes: Option<bool>,
    #[serde(rename = "LastPlayedDate", default, deserialize_with = "lenient")]
    pub last_played_date: Option<String>,
    #[serde(rename = "Played", default, deserialize_with = "lenient")]
    pub played: bool,
    #[serde(rename = "Key", default, deserialize_with = "lenient")]
    pub key: String,
}

/// System information (subset used for login diagnostics)
#[derive(Debug, Deserialize)]
pub struct SystemInfo {
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "ServerName", default)]
    pub server_name: String,
    #[serde(rename = "Version", default)]
    pub version: String,
    #[serde(rename = "OperatingSystem", default)]
    pub operating_system: String,
    #[serde(rename = "LocalAddress", default)]
    pub local_address: String,
    #[serde(rename = "HasPendingRestart", default)]
    pub has_pending_restart: bool,
}
