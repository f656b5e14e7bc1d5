//! Emby/Jellyfin client errors and response checks

use bytes::Bytes;
use reqwest::Response;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use reqwest::StatusCode;

/// Largest response body the client accepts (16 MiB)
pub const MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum EmbyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error {status} for {url}")]
    Http { status: StatusCode, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("Response too large ({size} bytes, max {MAX_RESPONSE_SIZE})")]
    ResponseTooLarge { size: u64 },
}

impl EmbyError {
    /// HTTP status of the failed response, if the server answered at all
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for EmbyError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for EmbyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderValue> for EmbyError {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

/// Turn a 4xx/5xx answer into [`EmbyError::Http`]
pub(crate) fn ensure_success(response: Response) -> Result<Response, EmbyError> {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(EmbyError::Http {
            status,
            url: response.url().to_string(),
        });
    }
    Ok(response)
}

/// Whole body, refusing anything over [`MAX_RESPONSE_SIZE`]. The declared
/// length is checked before any byte is read.
pub(crate) async fn read_body(response: Response) -> Result<Bytes, EmbyError> {
    let too_large = |size: u64| size > MAX_RESPONSE_SIZE as u64;

    if let Some(size) = response.content_length().filter(|size| too_large(*size)) {
        return Err(EmbyError::ResponseTooLarge { size });
    }
    let body = response.bytes().await?;
    let size = body.len() as u64;
    if too_large(size) {
        return Err(EmbyError::ResponseTooLarge { size });
    }
    Ok(body)
}

/// Size-limited body decoded as JSON
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, EmbyError> {
    let body = read_body(response).await?;
    Ok(serde_json::from_slice(&body)?)
}
