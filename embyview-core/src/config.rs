use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub paging: PagingConfig,
    pub http: HttpConfig,
    pub images: ImageCacheConfig,
    pub logging: LoggingConfig,
}

/// Media server connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server root, e.g. `http://192.168.1.10:8096`
    pub url: String,
    /// `/emby`, `/jellyfin` or empty; auto-detected from the host when unset
    pub api_prefix: Option<String>,
    pub user_id: String,
    pub token: String,
    /// Used to obtain a token when `token` is empty
    pub username: Option<String>,
    pub password: Option<String>,
    pub device_name: String,
    pub device_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8096".to_string(),
            api_prefix: None,
            user_id: String::new(),
            token: String::new(),
            username: None,
            password: None,
            device_name: "embyview-cli".to_string(),
            device_id: "embyview-cli".to_string(),
        }
    }
}

/// Paging session parameters; fixed for the lifetime of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    pub page_size: u32,
    /// Items from the end of loaded data that trigger the next page
    pub prefetch_distance: usize,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            prefetch_distance: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_seconds: u64,
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: 10,
            timeout_seconds: 30,
        }
    }
}

impl HttpConfig {
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// In-memory image cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageCacheConfig {
    pub max_entries: u64,
    pub ttl_seconds: u64,
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 512,
            ttl_seconds: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

const MAX_PAGE_SIZE: u32 = 500;

impl Config {
    /// Load configuration with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file
    /// 3. Defaults
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        // Load config file if provided
        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // Override with environment variables (EMBYVIEW_SERVER__URL, EMBYVIEW_PAGING__PAGE_SIZE, ...)
        builder = builder.add_source(
            Environment::with_prefix("EMBYVIEW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Check the configuration, collecting every problem instead of stopping
    /// at the first one
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        match url::Url::parse(&self.server.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(format!(
                "server.url must use http or https, got '{}'",
                url.scheme()
            )),
            Err(e) => errors.push(format!("server.url '{}' is invalid: {e}", self.server.url)),
        }

        if let Some(prefix) = &self.server.api_prefix {
            if !prefix.is_empty() && !prefix.starts_with('/') {
                errors.push(format!("server.api_prefix '{prefix}' must start with '/'"));
            }
        }

        if self.paging.page_size == 0 || self.paging.page_size > MAX_PAGE_SIZE {
            errors.push(format!(
                "paging.page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.paging.page_size
            ));
        }

        if self.paging.prefetch_distance == 0 {
            errors.push("paging.prefetch_distance must be at least 1".to_string());
        }

        if self.http.connect_timeout_seconds == 0 || self.http.timeout_seconds == 0 {
            errors.push("http timeouts must be greater than zero".to_string());
        }

        if self.images.max_entries == 0 {
            errors.push("images.max_entries must be greater than zero".to_string());
        }

        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format must be 'json' or 'pretty', got '{}'",
                self.logging.format
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// True when requests can be made without logging in first
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.server.token.is_empty() && !self.server.user_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.paging.page_size, 20);
        assert_eq!(config.paging.prefetch_distance, 5);
        assert_eq!(config.logging.format, "pretty");
        assert!(!config.has_credentials());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = Config::default();
        config.server.url = "ftp://media.local".to_string();
        config.paging.page_size = 0;
        config.paging.prefetch_distance = 0;
        config.logging.format = "xml".to_string();

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("server.url")));
        assert!(errors.iter().any(|e| e.contains("page_size")));
        assert!(errors.iter().any(|e| e.contains("prefetch_distance")));
        assert!(errors.iter().any(|e| e.contains("logging.format")));
    }

    #[test]
    fn test_validate_api_prefix() {
        let mut config = Config::default();
        config.server.api_prefix = Some("emby".to_string());
        assert!(config.validate().is_err());

        config.server.api_prefix = Some(String::new());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "server:\n  url: \"https://emby.example.com\"\n  user_id: \"u1\"\n  token: \"tok\"\npaging:\n  page_size: 50"
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.url, "https://emby.example.com");
        assert_eq!(config.paging.page_size, 50);
        // Unspecified values keep their defaults
        assert_eq!(config.paging.prefetch_distance, 5);
        assert!(config.has_credentials());
    }

    #[test]
    fn test_http_durations() {
        let http = HttpConfig::default();
        assert_eq!(http.connect_timeout(), Duration::from_secs(10));
        assert_eq!(http.timeout(), Duration::from_secs(30));
    }
}
