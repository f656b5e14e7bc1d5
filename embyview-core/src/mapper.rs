//! Wire item to `DisplayItem` projection
//!
//! Every default is substituted here, in one place. The mapping is pure and
//! total: any record the provider managed to decode maps to an item.

use embyview_providers::emby::types::Item;

use crate::models::{DisplayItem, FileFormat, ImageKind, MediaKind};

/// Server ticks are 100ns units
pub const TICKS_PER_MILLISECOND: i64 = 10_000;

/// Map one wire item. `server_base_url` is the API base the image URLs hang off.
#[must_use]
pub fn map_to_display_item(item: &Item, server_base_url: &str) -> DisplayItem {
    let kind = MediaKind::detect(&item.item_type, item.media_type.as_deref());
    let file_path = item
        .primary_media_source()
        .map(|source| source.path.clone())
        .unwrap_or_default();
    let file_format = detect_file_format(&file_path);
    let is_pointer_file = is_pointer_path(&file_path);

    let user_data = item.user_data.as_ref();
    let resume_position_ms = user_data
        .map(|data| ticks_to_millis(data.playback_position_ticks))
        .filter(|ms| *ms > 0);

    DisplayItem {
        id: item.id.clone(),
        title: display_title(item),
        subtitle: subtitle(item, kind),
        description: item.overview.clone().unwrap_or_default(),
        year: item.production_year.unwrap_or(0),
        kind,
        thumbnail_url: build_image_url(
            server_base_url,
            &item.id,
            ImageKind::Primary,
            item.image_tags.get(ImageKind::Primary.as_str()).map(String::as_str),
        ),
        backdrop_url: build_image_url(
            server_base_url,
            &item.id,
            ImageKind::Backdrop,
            item.backdrop_image_tags.first().map(String::as_str),
        ),
        duration_ms: item.run_time_ticks.map(ticks_to_millis).unwrap_or(0),
        playback_progress: playback_progress(user_data.and_then(|data| data.played_percentage)),
        resume_position_ms,
        is_favorite: user_data.is_some_and(|data| data.is_favorite),
        is_played: user_data.is_some_and(|data| data.played),
        community_rating: item.community_rating,
        official_rating: item.official_rating.clone().filter(|r| !r.is_empty()),
        pointer_target_path: if is_pointer_file {
            file_path.clone()
        } else {
            String::new()
        },
        file_path,
        file_format,
        is_pointer_file,
        media_sources: item.media_sources.clone(),
        chapters: item.chapters.clone(),
        user_data: item.user_data.clone(),
    }
}

/// Truncating tick conversion; negative ticks clamp to zero
#[must_use]
pub fn ticks_to_millis(ticks: i64) -> u64 {
    u64::try_from(ticks / TICKS_PER_MILLISECOND).unwrap_or(0)
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Format from the lowercased extension of the last segment of `path`
#[must_use]
pub fn detect_file_format(path: &str) -> FileFormat {
    file_name(path)
        .rsplit_once('.')
        .map_or(FileFormat::Unknown, |(_, ext)| FileFormat::from_extension(ext))
}

/// `path` ends with `.strm`, any case
#[must_use]
pub fn is_pointer_path(path: &str) -> bool {
    file_name(path)
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(FileFormat::POINTER_EXTENSION))
}

/// `{base}/Items/{id}/Images/{kind}?tag={tag}`, or empty when there is no tag
#[must_use]
pub fn build_image_url(base: &str, item_id: &str, kind: ImageKind, tag: Option<&str>) -> String {
    match tag.filter(|t| !t.is_empty()) {
        Some(tag) if !item_id.is_empty() => format!(
            "{}/Items/{}/Images/{}?tag={}",
            base.trim_end_matches('/'),
            item_id,
            kind.as_str(),
            url::form_urlencoded::byte_serialize(tag.as_bytes()).collect::<String>()
        ),
        _ => String::new(),
    }
}

/// `"{series} S01E02 - {name}"` for episodes, the raw name otherwise
#[must_use]
pub fn display_title(item: &Item) -> String {
    if item.item_type != "Episode" {
        return item.name.clone();
    }

    let season = item.parent_index_number.map(|n| format!("S{n:02}"));
    let episode = item.index_number.map(|n| format!("E{n:02}"));
    if season.is_none() && episode.is_none() {
        return item.name.clone();
    }

    let code = format!(
        "{}{}",
        season.unwrap_or_default(),
        episode.unwrap_or_default()
    );
    match item.series_name.as_deref().filter(|s| !s.is_empty()) {
        Some(series) => format!("{series} {code} - {}", item.name),
        None => format!("{code} - {}", item.name),
    }
}

fn subtitle(item: &Item, kind: MediaKind) -> String {
    let non_empty = |value: &Option<String>| value.clone().filter(|s| !s.is_empty());
    match kind {
        MediaKind::Episode => non_empty(&item.season_name)
            .or_else(|| non_empty(&item.series_name))
            .unwrap_or_default(),
        MediaKind::Music | MediaKind::Album => non_empty(&item.album).unwrap_or_default(),
        _ => item
            .production_year
            .filter(|year| *year > 0)
            .map(|year| year.to_string())
            .unwrap_or_default(),
    }
}

fn playback_progress(played_percentage: Option<f64>) -> f64 {
    match played_percentage {
        Some(pct) if pct.is_finite() => (pct / 100.0).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{episode_item, movie_item};
    use embyview_providers::emby::types::{MediaSource, UserData};
    use proptest::prelude::*;

    const BASE: &str = "http://emby.local:8096/emby";

    #[test]
    fn test_tick_conversion_truncates() {
        assert_eq!(ticks_to_millis(12_345), 1);
        assert_eq!(ticks_to_millis(0), 0);
        assert_eq!(ticks_to_millis(9_999), 0);
        assert_eq!(ticks_to_millis(-50_000), 0);
    }

    proptest! {
        #[test]
        fn prop_tick_conversion_is_integer_division(ticks in 0i64..=i64::MAX) {
            prop_assert_eq!(ticks_to_millis(ticks), (ticks / 10_000) as u64);
        }

        #[test]
        fn prop_mapping_never_panics(
            name in ".*",
            season in proptest::option::of(any::<i32>()),
            episode in proptest::option::of(any::<i32>()),
            ticks in proptest::option::of(any::<i64>()),
            path in ".*",
        ) {
            let mut item = episode_item("e", &name, "Show", season, episode);
            item.run_time_ticks = ticks;
            item.media_sources = vec![MediaSource { path, ..MediaSource::default() }];
            let mapped = map_to_display_item(&item, BASE);
            prop_assert_eq!(mapped.id, "e");
        }
    }

    #[test]
    fn test_episode_title_synthesis() {
        let item = episode_item("e1", "Pilot", "Show", Some(1), Some(1));
        assert_eq!(display_title(&item), "Show S01E01 - Pilot");

        let item = episode_item("e1", "Pilot", "Show", None, None);
        assert_eq!(display_title(&item), "Pilot");

        let item = episode_item("e1", "Finale", "Show", None, Some(12));
        assert_eq!(display_title(&item), "Show E12 - Finale");

        let mut item = episode_item("e1", "Pilot", "", Some(2), Some(3));
        item.series_name = None;
        assert_eq!(display_title(&item), "S02E03 - Pilot");
    }

    #[test]
    fn test_non_episode_keeps_raw_name() {
        let mut item = movie_item("m1", "Heat");
        item.parent_index_number = Some(1);
        item.index_number = Some(1);
        assert_eq!(display_title(&item), "Heat");
    }

    #[test]
    fn test_format_detection_is_case_insensitive() {
        assert_eq!(detect_file_format("/media/a.MKV"), FileFormat::Mkv);
        assert_eq!(detect_file_format("/media/a.mkv"), FileFormat::Mkv);
        assert_eq!(detect_file_format("/media/a.iso"), FileFormat::Unknown);
        assert_eq!(detect_file_format("/media/README"), FileFormat::Unknown);
        assert_eq!(detect_file_format("/media.dir/noext"), FileFormat::Unknown);
        assert_eq!(detect_file_format(r"D:\Movies\b.Mp4"), FileFormat::Mp4);
        assert_eq!(detect_file_format(""), FileFormat::Unknown);
        assert_eq!(detect_file_format("/links/.MKV"), FileFormat::Mkv);
        assert_eq!(detect_file_format("/links/.strm"), FileFormat::Strm);
    }

    #[test]
    fn test_pointer_file_detection() {
        let mut item = movie_item("m1", "Remote");
        item.media_sources[0].path = "/links/Remote.STRM".to_string();
        let mapped = map_to_display_item(&item, BASE);
        assert!(mapped.is_pointer_file);
        assert_eq!(mapped.pointer_target_path, "/links/Remote.STRM");
        assert_eq!(mapped.file_format, FileFormat::Strm);

        let mapped = map_to_display_item(&movie_item("m2", "Local"), BASE);
        assert!(!mapped.is_pointer_file);
        assert!(mapped.pointer_target_path.is_empty());

        let mut item = movie_item("m3", "Hidden");
        item.media_sources[0].path = "/links/.strm".to_string();
        let mapped = map_to_display_item(&item, BASE);
        assert!(mapped.is_pointer_file);
        assert_eq!(mapped.pointer_target_path, "/links/.strm");
        assert_eq!(mapped.file_format, FileFormat::Strm);

        assert!(is_pointer_path(r"C:\links\Show.Strm"));
        assert!(!is_pointer_path("/links/strm"));
        assert!(!is_pointer_path("/links.strm/movie.mkv"));
    }

    #[test]
    fn test_image_urls() {
        let mut item = movie_item("m1", "Heat");
        item.backdrop_image_tags = vec!["bd1".to_string(), "bd2".to_string()];
        let mapped = map_to_display_item(&item, "http://emby.local:8096/emby/");

        assert_eq!(
            mapped.thumbnail_url,
            "http://emby.local:8096/emby/Items/m1/Images/Primary?tag=primary-m1"
        );
        assert_eq!(
            mapped.backdrop_url,
            "http://emby.local:8096/emby/Items/m1/Images/Backdrop?tag=bd1"
        );

        item.image_tags.clear();
        item.backdrop_image_tags.clear();
        let mapped = map_to_display_item(&item, BASE);
        assert!(mapped.thumbnail_url.is_empty());
        assert!(mapped.backdrop_url.is_empty());
    }

    #[test]
    fn test_sparse_item_maps_to_defaults() {
        let item = Item {
            id: "x".to_string(),
            name: "Bare".to_string(),
            ..Item::default()
        };
        let mapped = map_to_display_item(&item, BASE);

        assert_eq!(mapped.title, "Bare");
        assert_eq!(mapped.subtitle, "");
        assert_eq!(mapped.year, 0);
        assert_eq!(mapped.duration_ms, 0);
        assert_eq!(mapped.kind, MediaKind::Unknown);
        assert_eq!(mapped.file_format, FileFormat::Unknown);
        assert!(mapped.thumbnail_url.is_empty());
        assert_eq!(mapped.community_rating, None);
        assert_eq!(mapped.resume_position_ms, None);
        assert!(!mapped.is_favorite);
    }

    #[test]
    fn test_mistyped_field_keeps_the_rest_of_the_record() {
        let item = Item::from_value_lenient(serde_json::json!({
            "Id": "x",
            "ProductionYear": "2001",
            "RunTimeTicks": 72_000_000_000_i64,
            "ImageTags": { "Primary": "t" },
            "MediaSources": [{ "Path": "/m/x.mkv" }]
        }));
        let mapped = map_to_display_item(&item, BASE);

        assert_eq!(mapped.year, 0);
        assert_eq!(mapped.thumbnail_url, format!("{BASE}/Items/x/Images/Primary?tag=t"));
        assert_eq!(mapped.duration_ms, 7_200_000);
        assert_eq!(mapped.file_format, FileFormat::Mkv);
    }

    #[test]
    fn test_user_data_projection() {
        let mut item = movie_item("m1", "Heat");
        item.user_data = Some(UserData {
            played_percentage: Some(150.0),
            playback_position_ticks: 600_000_000,
            is_favorite: true,
            played: false,
            ..UserData::default()
        });
        let mapped = map_to_display_item(&item, BASE);

        assert!((mapped.playback_progress - 1.0).abs() < f64::EPSILON);
        assert_eq!(mapped.resume_position_ms, Some(60_000));
        assert!(mapped.is_favorite);
        assert!(!mapped.is_played);
    }

    #[test]
    fn test_subtitles() {
        let mut episode = episode_item("e1", "Pilot", "Show", Some(1), Some(1));
        episode.season_name = Some("Season 1".to_string());
        assert_eq!(map_to_display_item(&episode, BASE).subtitle, "Season 1");

        episode.season_name = None;
        assert_eq!(map_to_display_item(&episode, BASE).subtitle, "Show");

        let mut movie = movie_item("m1", "Heat");
        movie.production_year = Some(1995);
        assert_eq!(map_to_display_item(&movie, BASE).subtitle, "1995");
        assert_eq!(map_to_display_item(&movie, BASE).year, 1995);
    }
}
