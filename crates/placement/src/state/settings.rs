//! Configuration loading

use std::path::Path;
use std::time::Duration;

use shared::ArConfig;
use tracing::{info, warn};

use crate::error::ArError;

/// Parse a config file
pub fn load_config_file(path: &Path) -> Result<ArConfig, ArError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| ArError::Config(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&json).map_err(|e| ArError::Config(format!("{}: {e}", path.display())))
}

/// Load config from `path`, else the user config dir, else defaults
pub fn load_config(path: Option<&Path>) -> ArConfig {
    if let Some(path) = path {
        match load_config_file(path) {
            Ok(config) => return config,
            Err(e) => warn!("{e}"),
        }
    }
    if let Some(dirs) = directories::ProjectDirs::from("com", "arplacement", "ar-placement") {
        let config_path = dirs.config_dir().join("config.json");
        if config_path.exists() {
            match load_config_file(&config_path) {
                Ok(config) => return config,
                Err(e) => warn!("{e}"),
            }
        }
    }
    ArConfig::default()
}

/// Fetch config over HTTP with a bounded wait; any failure yields defaults
pub async fn load_remote_config(url: &str, timeout: Duration) -> ArConfig {
    match fetch_remote(url, timeout).await {
        Ok(config) => {
            info!("Loaded {} models from {url}", config.models.len());
            config
        }
        Err(e) => {
            warn!("Remote config unavailable, using defaults: {e}");
            ArConfig::default()
        }
    }
}

async fn fetch_remote(url: &str, timeout: Duration) -> Result<ArConfig, ArError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ArError::Config(e.to_string()))?;
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| ArError::Config(e.to_string()))?;
    response
        .json::<ArConfig>()
        .await
        .map_err(|e| ArError::Config(e.to_string()))
}
