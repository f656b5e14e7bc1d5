//! Emby/Jellyfin HTTP Client

use std::sync::LazyLock;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, header::{HeaderMap, HeaderValue, CONTENT_TYPE}};
use serde_json::json;
use tracing::debug;

use super::error::{ensure_success, read_body, read_json, EmbyError};
use super::types::{AuthResponse, ItemsResponse, RawItemsResponse, SystemInfo, UserInfo};

/// URL-encode a string for safe use in query parameters
fn url_encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// Fields requested on every item listing; the mapper needs media sources,
/// paths and chapters on top of the server defaults
const ITEM_FIELDS: &str = "BasicSyncInfo,CanDelete,Container,PrimaryImageAspectRatio,ProductionYear,\
Status,EndDate,Overview,Path,MediaSources,Chapters";

/// Shared HTTP client for all Emby requests (connection pooling)
/// Redirects are disabled.
static SHARED_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    build_http_client(Duration::from_secs(10), Duration::from_secs(30))
        .expect("Failed to build Emby shared HTTP client")
});

/// Build an HTTP client with the given timeouts and the same hardening as the
/// shared one
pub fn build_http_client(connect_timeout: Duration, timeout: Duration) -> Result<Client, EmbyError> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        .pool_max_idle_per_host(10)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| EmbyError::InvalidConfig(format!("Failed to build HTTP client: {e}")))
}

const X_EMBY_TOKEN: &str = "X-Emby-Token";
const X_EMBY_AUTHORIZATION: &str = "X-Emby-Authorization";

/// How this client introduces itself to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub client: String,
    pub device: String,
    pub device_id: String,
    pub version: String,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            client: "embyview".to_string(),
            device: "embyview-cli".to_string(),
            device_id: "embyview-cli".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ClientIdentity {
    fn authorization_header(&self) -> String {
        format!(
            "MediaBrowser Client=\"{}\", Device=\"{}\", DeviceId=\"{}\", Version=\"{}\"",
            self.client, self.device, self.device_id, self.version
        )
    }
}

/// One page of a recursive item listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemsQuery {
    pub user_id: String,
    pub parent_id: Option<String>,
    pub search_term: Option<String>,
    pub recursive: bool,
    pub start_index: u64,
    pub limit: u32,
}

impl ItemsQuery {
    #[must_use]
    pub fn new(user_id: impl Into<String>, start_index: u64, limit: u32) -> Self {
        Self {
            user_id: user_id.into(),
            parent_id: None,
            search_term: None,
            recursive: true,
            start_index,
            limit,
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    #[must_use]
    pub fn with_search_term(mut self, term: impl Into<String>) -> Self {
        self.search_term = Some(term.into());
        self
    }
}

/// Emby/Jellyfin HTTP Client
#[derive(Debug, Clone)]
pub struct EmbyClient {
    host: String,
    token: Option<String>,
    user_id: Option<String>,
    client: Client,
    api_prefix: Option<String>,
    identity: ClientIdentity,
}

impl EmbyClient {
    /// Create a new Emby client (reuses shared connection pool)
    pub fn new(host: impl Into<String>) -> Result<Self, EmbyError> {
        let host = host.into();
        if host.is_empty() {
            return Err(EmbyError::InvalidConfig("Missing host".to_string()));
        }
        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            token: None,
            user_id: None,
            client: SHARED_CLIENT.clone(),
            api_prefix: None,
            identity: ClientIdentity::default(),
        })
    }

    /// Create a new Emby client with credentials (reuses shared connection pool)
    pub fn with_credentials(
        host: impl Into<String>,
        token: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Result<Self, EmbyError> {
        let mut client = Self::new(host)?;
        client.set_credentials(token, user_id);
        Ok(client)
    }

    /// Replace the HTTP client (custom timeouts)
    #[must_use]
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Set a custom API prefix (e.g., "/emby" or "/jellyfin").
    /// When set, overrides the auto-detection based on hostname.
    pub fn set_api_prefix(&mut self, prefix: impl Into<String>) {
        self.api_prefix = Some(prefix.into());
    }

    pub fn set_identity(&mut self, identity: ClientIdentity) {
        self.identity = identity;
    }

    /// Set authentication token and user ID
    pub fn set_credentials(&mut self, token: impl Into<String>, user_id: impl Into<String>) {
        self.token = Some(token.into());
        self.user_id = Some(user_id.into());
    }

    /// Get API prefix (/emby or /jellyfin).
    /// Uses the explicitly set prefix if available, otherwise auto-detects
    /// based on whether the host URL contains "jellyfin".
    fn get_api_prefix(&self) -> &str {
        if let Some(ref prefix) = self.api_prefix {
            return prefix;
        }
        if self.host.contains("jellyfin") {
            "/jellyfin"
        } else {
            "/emby"
        }
    }

    /// Host plus API prefix; image and stream URLs hang off this
    #[must_use]
    pub fn api_base(&self) -> String {
        format!("{}{}", self.host, self.get_api_prefix())
    }

    fn require_user_id(&self) -> Result<&str, EmbyError> {
        self.user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| EmbyError::InvalidConfig("Missing user_id".to_string()))
    }

    /// Build request headers
    fn build_headers(&self) -> Result<HeaderMap, EmbyError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            X_EMBY_AUTHORIZATION,
            HeaderValue::from_str(&self.identity.authorization_header())?,
        );

        if let Some(ref token) = self.token {
            headers.insert(X_EMBY_TOKEN, HeaderValue::from_str(token)?);
        }

        Ok(headers)
    }

    /// Login to Emby/Jellyfin server
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(String, String), EmbyError> {
        let url = format!("{}/Users/AuthenticateByName", self.api_base());

        let body = json!({
            "Username": username,
            "Pw": password,
        });

        let response = self
            .client
            .post(&url)
            .headers(self.build_headers()?)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EmbyError::Auth(format!("Login failed: {}", response.status())));
        }

        let auth_resp: AuthResponse = read_json(response).await?;
        let token = auth_resp.access_token;
        let user_id = auth_resp.user.id;

        self.set_credentials(token.clone(), user_id.clone());
        Ok((token, user_id))
    }

    /// Get current user information
    pub async fn me(&self) -> Result<UserInfo, EmbyError> {
        let user_id = self.require_user_id()?;
        let url = format!("{}/Users/{}", self.api_base(), url_encode(user_id));

        let response = self
            .client
            .get(&url)
            .headers(self.build_headers()?)
            .send()
            .await?;

        let response = ensure_success(response)?;
        let user: UserInfo = read_json(response).await?;
        Ok(user)
    }

    /// Get the user's top-level libraries
    pub async fn get_views(&self) -> Result<ItemsResponse, EmbyError> {
        let user_id = self.require_user_id()?;
        let url = format!("{}/Users/{}/Views", self.api_base(), url_encode(user_id));

        let response = self
            .client
            .get(&url)
            .headers(self.build_headers()?)
            .send()
            .await?;

        let response = ensure_success(response)?;
        let raw: RawItemsResponse = read_json(response).await?;
        Ok(raw.into())
    }

    /// Get one page of items under a container or matching a search term
    pub async fn get_items_page(&self, query: &ItemsQuery) -> Result<ItemsResponse, EmbyError> {
        if query.user_id.is_empty() {
            return Err(EmbyError::InvalidConfig("Missing user_id".to_string()));
        }

        let mut url = format!(
            "{}/Users/{}/Items?SortBy=SortName&SortOrder=Ascending&Recursive={}&StartIndex={}&Limit={}&Fields={}",
            self.api_base(),
            url_encode(&query.user_id),
            query.recursive,
            query.start_index,
            query.limit,
            ITEM_FIELDS,
        );

        if let Some(ref pid) = query.parent_id {
            url.push_str(&format!("&ParentId={}", url_encode(pid)));
        }

        if let Some(ref term) = query.search_term {
            url.push_str(&format!("&SearchTerm={}", url_encode(term)));
        }

        debug!(start_index = query.start_index, limit = query.limit, "Requesting items page");

        let response = self
            .client
            .get(&url)
            .headers(self.build_headers()?)
            .send()
            .await?;

        let response = ensure_success(response)?;
        let raw: RawItemsResponse = read_json(response).await?;
        Ok(raw.into())
    }

    /// Get system information
    pub async fn get_system_info(&self) -> Result<SystemInfo, EmbyError> {
        let url = format!("{}/System/Info", self.api_base());

        let response = self
            .client
            .get(&url)
            .headers(self.build_headers()?)
            .send()
            .await?;

        let response = ensure_success(response)?;
        let info: SystemInfo = read_json(response).await?;
        Ok(info)
    }

    /// Download an image (or any small binary) by absolute URL
    pub async fn fetch_image(&self, url: &str) -> Result<Bytes, EmbyError> {
        let response = self
            .client
            .get(url)
            .headers(self.build_headers()?)
            .send()
            .await?;

        let response = ensure_success(response)?;
        read_body(response).await
    }

    /// Logout
    pub async fn logout(&self) -> Result<(), EmbyError> {
        let url = format!("{}/Sessions/Logout", self.api_base());

        let response = self
            .client
            .post(&url)
            .headers(self.build_headers()?)
            .send()
            .await?;

        ensure_success(response)?;
        Ok(())
    }

    /// Get host URL
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Check if client has credentials
    #[must_use]
    pub const fn has_credentials(&self) -> bool {
        self.token.is_some() && self.user_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = EmbyClient::new("https://emby.example.com/").unwrap();
        assert_eq!(client.host(), "https://emby.example.com");
        assert!(!client.has_credentials());

        let client_with_creds = EmbyClient::with_credentials(
            "https://emby.example.com",
            "test_token",
            "user123"
        ).unwrap();
        assert!(client_with_creds.has_credentials());
        assert_eq!(client_with_creds.user_id(), Some("user123"));
    }

    #[test]
    fn test_empty_host_rejected() {
        assert!(matches!(EmbyClient::new(""), Err(EmbyError::InvalidConfig(_))));
    }

    #[test]
    fn test_api_prefix_detection() {
        let emby_client = EmbyClient::new("https://emby.example.com").unwrap();
        assert_eq!(emby_client.get_api_prefix(), "/emby");
        assert_eq!(emby_client.api_base(), "https://emby.example.com/emby");

        let jellyfin_client = EmbyClient::new("https://jellyfin.example.com").unwrap();
        assert_eq!(jellyfin_client.get_api_prefix(), "/jellyfin");

        let mut custom = EmbyClient::new("https://media.example.com").unwrap();
        custom.set_api_prefix("");
        assert_eq!(custom.api_base(), "https://media.example.com");
    }

    #[test]
    fn test_authorization_header() {
        let identity = ClientIdentity {
            client: "embyview".to_string(),
            device: "tv".to_string(),
            device_id: "dev-1".to_string(),
            version: "1.0.0".to_string(),
        };
        assert_eq!(
            identity.authorization_header(),
            "MediaBrowser Client=\"embyview\", Device=\"tv\", DeviceId=\"dev-1\", Version=\"1.0.0\""
        );
    }

    #[test]
    fn test_items_query_builder() {
        let query = ItemsQuery::new("u1", 40, 20).with_parent("42");
        assert_eq!(query.parent_id.as_deref(), Some("42"));
        assert!(query.search_term.is_none());
        assert!(query.recursive);

        let search = ItemsQuery::new("u1", 0, 20).with_search_term("test");
        assert_eq!(search.search_term.as_deref(), Some("test"));
    }
}
