use serde::{Deserialize, Serialize};
use std::str::FromStr;

use embyview_providers::emby::types::{Chapter, MediaSource, UserData};

/// Coarse content kind used for layout decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Series,
    Episode,
    Music,
    Album,
    Photo,
    #[default]
    Unknown,
}

impl MediaKind {
    /// Classify from the wire `Type` and `MediaType` fields
    #[must_use]
    pub fn detect(item_type: &str, media_type: Option<&str>) -> Self {
        let media_type = media_type.unwrap_or_default();
        match item_type {
            "Movie" => Self::Movie,
            "Series" => Self::Series,
            "Episode" => Self::Episode,
            "MusicAlbum" => Self::Album,
            "Audio" => Self::Music,
            "Photo" => Self::Photo,
            _ => match media_type {
                "Video" => Self::Movie,
                "Audio" => Self::Music,
                "Photo" => Self::Photo,
                _ => Self::Unknown,
            },
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Movie => "movie",
            Self::Series => "series",
            Self::Episode => "episode",
            Self::Music => "music",
            Self::Album => "album",
            Self::Photo => "photo",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Container format detected from a media source path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    /// Pointer file holding the location of the real stream
    Strm,
    Mp4,
    Mkv,
    Avi,
    Mov,
    Wmv,
    Flv,
    Webm,
    M4v,
    Ts,
    M2ts,
    #[default]
    Unknown,
}

impl FileFormat {
    pub const POINTER_EXTENSION: &'static str = "strm";

    /// Look up a bare extension (no dot); unknown extensions map to `Unknown`
    #[must_use]
    pub fn from_extension(ext: &str) -> Self {
        ext.parse().unwrap_or(Self::Unknown)
    }
}

impl FromStr for FileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strm" => Ok(Self::Strm),
            "mp4" => Ok(Self::Mp4),
            "mkv" => Ok(Self::Mkv),
            "avi" => Ok(Self::Avi),
            "mov" => Ok(Self::Mov),
            "wmv" => Ok(Self::Wmv),
            "flv" => Ok(Self::Flv),
            "webm" => Ok(Self::Webm),
            "m4v" => Ok(Self::M4v),
            "ts" => Ok(Self::Ts),
            "m2ts" => Ok(Self::M2ts),
            _ => Err(format!("Unknown file format: {s}")),
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Strm => "strm",
            Self::Mp4 => "mp4",
            Self::Mkv => "mkv",
            Self::Avi => "avi",
            Self::Mov => "mov",
            Self::Wmv => "wmv",
            Self::Flv => "flv",
            Self::Webm => "webm",
            Self::M4v => "m4v",
            Self::Ts => "ts",
            Self::M2ts => "m2ts",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Server image slots the mapper resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Primary,
    Backdrop,
}

impl ImageKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "Primary",
            Self::Backdrop => "Backdrop",
        }
    }
}

/// UI-ready projection of one server item
///
/// Built fresh on every page load and never mutated afterwards. Fields with a
/// natural default (empty string, zero, `false`) are never optional; the
/// `Option` fields are the ones where "unknown" differs from zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DisplayItem {
    /// Stable server id, used as the list-diffing key
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    /// Production year, 0 when unknown
    pub year: i32,
    pub kind: MediaKind,
    pub thumbnail_url: String,
    pub backdrop_url: String,
    pub duration_ms: u64,
    /// Fraction watched in `0.0..=1.0`
    pub playback_progress: f64,
    pub resume_position_ms: Option<u64>,
    pub is_favorite: bool,
    pub is_played: bool,
    pub community_rating: Option<f64>,
    pub official_rating: Option<String>,
    pub file_path: String,
    pub file_format: FileFormat,
    pub is_pointer_file: bool,
    /// Raw path of the pointer file; empty unless `is_pointer_file`
    pub pointer_target_path: String,
    pub media_sources: Vec<MediaSource>,
    pub chapters: Vec<Chapter>,
    pub user_data: Option<UserData>,
}

impl DisplayItem {
    /// Id of the media source the player should open
    #[must_use]
    pub fn primary_media_source_id(&self) -> Option<&str> {
        self.media_sources
            .first()
            .map(|source| source.id.as_str())
            .filter(|id| !id.is_empty())
    }

    #[must_use]
    pub const fn is_playable(&self) -> bool {
        matches!(
            self.kind,
            MediaKind::Movie | MediaKind::Episode | MediaKind::Music
        )
    }
}
