//! Integration tests for the Emby HTTP client against a mock server

use embyview_providers::{EmbyClient, EmbyError, ItemsQuery};
use serde_json::json;
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn items_page_json(ids: &[&str], total: u64) -> serde_json::Value {
    let items: Vec<_> = ids
        .iter()
        .map(|id| {
            json!({
                "Id": id,
                "Name": format!("Item {id}"),
                "Type": "Movie",
                "RunTimeTicks": 72_000_000_000_i64,
                "ImageTags": { "Primary": "tag-primary" },
                "MediaSources": [
                    { "Id": format!("ms-{id}"), "Path": format!("/media/{id}.mkv"), "Container": "mkv" }
                ]
            })
        })
        .collect();
    json!({ "Items": items, "TotalRecordCount": total, "StartIndex": 0 })
}

#[tokio::test]
async fn test_get_items_page_sends_paging_parameters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/emby/Users/u1/Items"))
        .and(query_param("StartIndex", "40"))
        .and(query_param("Limit", "20"))
        .and(query_param("ParentId", "42"))
        .and(query_param("Recursive", "true"))
        .and(header("X-Emby-Token", "tok"))
        .and(header_exists("X-Emby-Authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(items_page_json(&["a", "b"], 42)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = EmbyClient::with_credentials(mock_server.uri(), "tok", "u1").unwrap();
    let query = ItemsQuery::new("u1", 40, 20).with_parent("42");
    let page = client.get_items_page(&query).await.unwrap();

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].id, "a");
    assert_eq!(page.items[0].media_sources[0].path, "/media/a.mkv");
    assert_eq!(page.total_record_count, 42);
}

#[tokio::test]
async fn test_search_term_is_encoded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/emby/Users/u1/Items"))
        .and(query_param("SearchTerm", "star wars"))
        .respond_with(ResponseTemplate::new(200).set_body_json(items_page_json(&["sw"], 1)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = EmbyClient::with_credentials(mock_server.uri(), "tok", "u1").unwrap();
    let query = ItemsQuery::new("u1", 0, 20).with_search_term("star wars");
    let page = client.get_items_page(&query).await.unwrap();

    assert_eq!(page.items.len(), 1);
}

#[tokio::test]
async fn test_server_error_maps_to_http_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/emby/Users/u1/Items"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let client = EmbyClient::with_credentials(mock_server.uri(), "tok", "u1").unwrap();
    let err = client
        .get_items_page(&ItemsQuery::new("u1", 0, 20))
        .await
        .unwrap_err();

    assert_eq!(err.status().map(|s| s.as_u16()), Some(503));
}

#[tokio::test]
async fn test_invalid_json_maps_to_parse_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/emby/Users/u1/Items"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let client = EmbyClient::with_credentials(mock_server.uri(), "tok", "u1").unwrap();
    let err = client
        .get_items_page(&ItemsQuery::new("u1", 0, 20))
        .await
        .unwrap_err();

    assert!(matches!(err, EmbyError::Parse(_)));
}

#[tokio::test]
async fn test_malformed_record_does_not_fail_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/emby/Users/u1/Items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [
                { "Id": "good", "Name": "Good" },
                { "Id": "bad", "Name": "Bad", "ProductionYear": "nineteen" }
            ],
            "TotalRecordCount": 2
        })))
        .mount(&mock_server)
        .await;

    let client = EmbyClient::with_credentials(mock_server.uri(), "tok", "u1").unwrap();
    let page = client
        .get_items_page(&ItemsQuery::new("u1", 0, 20))
        .await
        .unwrap();

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[1].id, "bad");
    assert_eq!(page.items[1].production_year, None);
}

#[tokio::test]
async fn test_missing_user_id_is_config_error() {
    let client = EmbyClient::new("http://127.0.0.1:9").unwrap();
    let err = client
        .get_items_page(&ItemsQuery::new("", 0, 20))
        .await
        .unwrap_err();
    assert!(matches!(err, EmbyError::InvalidConfig(_)));
}

#[tokio::test]
async fn test_login_stores_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emby/Users/AuthenticateByName"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AccessToken": "fresh-token",
            "User": { "Id": "user-9", "Name": "alice" },
            "ServerId": "srv"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut client = EmbyClient::new(mock_server.uri()).unwrap();
    let (token, user_id) = client.login("alice", "secret").await.unwrap();

    assert_eq!(token, "fresh-token");
    assert_eq!(user_id, "user-9");
    assert!(client.has_credentials());
}

#[tokio::test]
async fn test_login_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emby/Users/AuthenticateByName"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let mut client = EmbyClient::new(mock_server.uri()).unwrap();
    let err = client.login("alice", "wrong").await.unwrap_err();
    assert!(matches!(err, EmbyError::Auth(_)));
    assert!(!client.has_credentials());
}

#[tokio::test]
async fn test_fetch_image_returns_bytes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/emby/Items/a/Images/Primary"))
        .and(query_param("tag", "t1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
        .mount(&mock_server)
        .await;

    let client = EmbyClient::with_credentials(mock_server.uri(), "tok", "u1").unwrap();
    let url = format!("{}/Items/a/Images/Primary?tag=t1", client.api_base());
    let bytes = client.fetch_image(&url).await.unwrap();
    assert_eq!(&bytes[..], &[0x89, b'P', b'N', b'G']);
}
