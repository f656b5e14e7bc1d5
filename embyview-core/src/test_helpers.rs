//! Test helpers and fixtures for embyview-core tests

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use embyview_providers::emby::types::{Item, ItemsResponse, MediaSource};

use crate::models::DisplayItem;
use crate::paging::{CombinedLoadStates, Page, PageKey, PagingController};

/// Movie with a primary image tag `primary-{id}` and one mkv source `ms-{id}`
pub fn movie_item(id: &str, name: &str) -> Item {
    Item {
        id: id.to_string(),
        name: name.to_string(),
        item_type: "Movie".to_string(),
        media_type: Some("Video".to_string()),
        run_time_ticks: Some(72_000_000_000),
        image_tags: HashMap::from([("Primary".to_string(), format!("primary-{id}"))]),
        media_sources: vec![MediaSource {
            id: format!("ms-{id}"),
            path: format!("/media/{id}.mkv"),
            container: "mkv".to_string(),
            ..MediaSource::default()
        }],
        ..Item::default()
    }
}

pub fn episode_item(
    id: &str,
    name: &str,
    series: &str,
    season: Option<i32>,
    episode: Option<i32>,
) -> Item {
    Item {
        item_type: "Episode".to_string(),
        series_name: Some(series.to_string()),
        parent_index_number: season,
        index_number: episode,
        ..movie_item(id, name)
    }
}

/// `count` movies with ids `item-{start}` onwards
pub fn items_response(start: u64, count: usize) -> ItemsResponse {
    let items = (start..start + count as u64)
        .map(|n| movie_item(&format!("item-{n}"), &format!("Item {n}")))
        .collect();
    ItemsResponse {
        items,
        total_record_count: start + count as u64,
        start_index: start,
    }
}

/// Page with explicit keys, bypassing the key derivation in `Page::new`
pub fn page_with_keys(previous_key: Option<PageKey>, next_key: Option<PageKey>, len: usize) -> Arc<Page> {
    Arc::new(Page {
        data: (0..len)
            .map(|i| DisplayItem {
                id: format!("fixture-{i}"),
                ..DisplayItem::default()
            })
            .collect(),
        previous_key,
        next_key,
    })
}

/// Wait until the controller's load states satisfy `predicate`
pub async fn wait_for_states(
    controller: &PagingController,
    predicate: impl Fn(&CombinedLoadStates) -> bool,
) -> CombinedLoadStates {
    let mut states = controller.load_states();
    let result = tokio::time::timeout(Duration::from_secs(5), states.wait_for(|s| predicate(s)))
        .await
        .expect("timed out waiting for load states")
        .expect("load state channel closed");
    result.clone()
}
