//! TOML configuration file discovery and loading
//!
//! An explicit `--config-file` must exist. Without one, the default
//! `<config_dir>/Brokerlink/brokerlink.toml` is used when present. `--url`
//! overrides the file's `url`.

use super::args::Args;
use crate::queue::{ClientConfig, QueueError, QueueResult};
use std::path::{Path, PathBuf};

/// Default configuration file location, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("Brokerlink").join("brokerlink.toml"))
}

/// Pick the configuration file to load
pub fn resolve_config_path(config_file: Option<&Path>) -> QueueResult<Option<PathBuf>> {
    match config_file {
        Some(path) if path.exists() => Ok(Some(path.to_path_buf())),
        Some(path) => Err(QueueError::Config {
            message: format!(
                "The specified configuration file does not exist: {}",
                path.display()
            ),
        }),
        None => Ok(default_config_path().filter(|path| path.exists())),
    }
}

/// Read and parse one configuration file
///
/// Validation is left to the caller so CLI overrides can fill in fields
/// the file leaves out.
pub async fn load_config_file(path: &Path) -> QueueResult<ClientConfig> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| QueueError::Config {
            message: format!("Error reading configuration file {}: {}", path.display(), e),
        })?;
    toml::from_str(&contents).map_err(|e| QueueError::Config {
        message: format!("Error parsing configuration file {}: {}", path.display(), e),
    })
}

/// Build the client configuration from the file (if any) and CLI overrides
pub async fn load_client_config(args: &Args) -> QueueResult<ClientConfig> {
    let mut config = match resolve_config_path(args.config_file.as_deref())? {
        Some(path) => {
            log::debug!("loading configuration from {}", path.display());
            load_config_file(&path).await?
        }
        None => {
            log::debug!("no configuration file found, using defaults");
            ClientConfig::default()
        }
    };

    if let Some(url) = &args.url {
        config.url = url.clone();
    }
    config.validate()?;
    Ok(config)
}
