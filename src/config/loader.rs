// Configuration loader
// Loads settings from --config, $TRANSFERD_CLIENT_CONFIG or ~/.transferd-client/config.toml

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::settings::Settings;
use crate::errors::{Error, Result};

/// Environment variable naming an alternate settings file
pub const CONFIG_ENV_VAR: &str = "TRANSFERD_CLIENT_CONFIG";

/// `~/.transferd-client/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".transferd-client").join("config.toml"))
}

/// Settings file to read: explicit path, then environment, then home directory
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    match std::env::var(CONFIG_ENV_VAR) {
        Ok(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => default_config_path(),
    }
}

/// Parse settings from TOML text
pub fn parse_settings(contents: &str) -> Result<Settings> {
    let settings: Settings = toml::from_str(contents)
        .map_err(|e| Error::Config(format!("failed to parse settings: {e}")))?;
    settings.daemon.validate()?;
    Ok(settings)
}

/// Load settings; a missing default file yields defaults, a missing explicit file is an error
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let Some(path) = resolve_config_path(explicit) else {
        debug!("No home directory, using default settings");
        return Ok(Settings::default());
    };

    if !path.exists() {
        if explicit.is_some() {
            return Err(Error::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        debug!(path = %path.display(), "No settings file, using defaults");
        return Ok(Settings::default());
    }

    let contents = fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
    debug!(path = %path.display(), "Loaded settings");
    parse_settings(&contents)
}
