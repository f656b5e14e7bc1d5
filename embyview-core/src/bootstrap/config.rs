//! Configuration loading

use std::path::Path;

use anyhow::Result;
use tracing::info;

use crate::Config;

/// Load configuration from config file or environment variables
///
/// Config file search order:
/// 1. `explicit_path` (e.g. a `--config` flag)
/// 2. `EMBYVIEW_CONFIG_PATH` environment variable
/// 3. ./config.yaml (current working directory)
/// 4. Fall back to environment variables only
///
/// An explicit path that does not exist is an error rather than a fallback.
pub fn load_config(explicit_path: Option<&str>) -> Result<Config> {
    if let Some(path) = explicit_path {
        if !Path::new(path).exists() {
            anyhow::bail!("Config file {path} does not exist");
        }
    }

    let config_path = explicit_path
        .map(str::to_string)
        .or_else(|| {
            std::env::var("EMBYVIEW_CONFIG_PATH")
                .ok()
                .filter(|p| Path::new(p).exists())
        })
        .or_else(|| {
            let cwd = "config.yaml";
            Path::new(cwd).exists().then(|| cwd.to_string())
        });

    // Logging is not initialized yet, so report through stderr
    let config = if let Some(path) = config_path {
        eprintln!("Loading config from {path}");
        Config::from_file(&path)?
    } else {
        eprintln!("No config file found, using environment variables");
        Config::from_env()?
    };

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Config validation error: {error}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        ));
    }

    info!("Configuration loaded and validated successfully");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_explicit_path_is_used() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "server:\n  url: \"http://media.lan:8096\"\npaging:\n  prefetch_distance: 8").unwrap();

        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.server.url, "http://media.lan:8096");
        assert_eq!(config.paging.prefetch_distance, 8);
    }

    #[test]
    fn test_missing_explicit_path_fails() {
        assert!(load_config(Some("/nonexistent/embyview.yaml")).is_err());
    }

    #[test]
    fn test_invalid_config_fails_validation() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "paging:\n  page_size: 0").unwrap();

        let err = load_config(file.path().to_str()).unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }
}
