//! Client and repository construction

use std::sync::Arc;

use embyview_providers::emby::client::build_http_client;
use embyview_providers::{ClientIdentity, EmbyClient};
use tracing::info;

use crate::images::{CachedImageResolver, EmbyImageResolver};
use crate::paging::{EmbyItemFetcher, ServerContext, SharedToken, TokenSource};
use crate::repository::MediaRepository;
use crate::{Config, Error, Result};

/// Container for everything a front end needs
#[derive(Clone)]
pub struct Services {
    /// Authenticated client
    pub client: EmbyClient,
    pub identity: ClientIdentity,
    /// Token used by every paged fetch; replace it after a new login
    pub token: SharedToken,
    pub repository: MediaRepository,
    pub images: CachedImageResolver<EmbyImageResolver>,
}

impl Services {
    /// API base that image and stream URLs hang off
    #[must_use]
    pub fn api_base(&self) -> String {
        self.client.api_base()
    }

    #[must_use]
    pub fn current_token(&self) -> Option<String> {
        self.token.current_token()
    }
}

/// Build an unauthenticated client from the server and http sections
pub fn build_client(config: &Config) -> Result<(EmbyClient, ClientIdentity)> {
    let http = build_http_client(config.http.connect_timeout(), config.http.timeout())?;

    let identity = ClientIdentity {
        device: config.server.device_name.clone(),
        device_id: config.server.device_id.clone(),
        ..ClientIdentity::default()
    };

    let mut client = EmbyClient::new(config.server.url.clone())?.with_http_client(http);
    if let Some(prefix) = &config.server.api_prefix {
        client.set_api_prefix(prefix.clone());
    }
    client.set_identity(identity.clone());

    Ok((client, identity))
}

/// Initialize the client, log in if needed and build the repository
pub async fn init_services(config: &Config) -> Result<Services> {
    let (mut client, identity) = build_client(config)?;

    // 1. Credentials: configured token, else username/password login
    let token = SharedToken::default();
    if config.has_credentials() {
        client.set_credentials(config.server.token.clone(), config.server.user_id.clone());
        token.set(config.server.token.clone());
    } else if let (Some(username), Some(password)) =
        (config.server.username.as_deref(), config.server.password.as_deref())
    {
        info!(username, "No token configured, logging in");
        let (access_token, _) = client.login(username, password).await?;
        token.set(access_token);
    } else {
        return Err(Error::InvalidInput(
            "either server.token and server.user_id or server.username and server.password must be set"
                .to_string(),
        ));
    }

    // 2. Acting user
    let user_id = client
        .user_id()
        .map(str::to_string)
        .ok_or_else(|| Error::Internal("client has no user id after authentication".to_string()))?;

    // 3. Paging
    let context = ServerContext::new(client.api_base(), user_id);
    let fetcher = EmbyItemFetcher::new(client.clone(), Arc::new(token.clone()));
    let repository = MediaRepository::new(Arc::new(fetcher), context, config.paging);

    // 4. Images
    let images = CachedImageResolver::new(EmbyImageResolver::new(client.clone()), &config.images);

    info!(api_base = %client.api_base(), "Services initialized");

    Ok(Services {
        client,
        identity,
        token,
        repository,
        images,
    })
}
