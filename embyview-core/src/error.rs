use embyview_providers::EmbyError;
use thiserror::Error;

/// Why a single page (or image) could not be fetched.
///
/// Cheap to clone: load states and paging events carry it to every observer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Transport failure: timeout, refused connection, TLS
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response
    #[error("Server error {status} for {url}")]
    Server { status: u16, url: String },

    /// Body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The load itself failed (e.g. a panicking fetcher)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FetchError {
    /// True for failures a plain retry with the same key may fix
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. })
    }
}

impl From<EmbyError> for FetchError {
    fn from(err: EmbyError) -> Self {
        match err {
            EmbyError::Network(msg) => Self::Network(msg),
            EmbyError::Http { status, url } => Self::Server { status: status.as_u16(), url },
            EmbyError::Parse(msg) => Self::Decode(msg),
            EmbyError::ResponseTooLarge { size } => {
                Self::Decode(format!("response too large ({size} bytes)"))
            }
            EmbyError::Auth(msg) => Self::Unauthorized(msg),
            EmbyError::InvalidConfig(msg) | EmbyError::InvalidHeader(msg) => Self::Config(msg),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Provider error: {0}")]
    Provider(#[from] EmbyError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
