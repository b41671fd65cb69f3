//! User configuration loading for yakusoku.
//!
//! User config location: $XDG_CONFIG_HOME/yakusoku/yakusoku.toml
//! Fallback: the platform config directory (~/.config/yakusoku/yakusoku.toml on Linux)

use std::fs;
use std::path::PathBuf;

use super::settings::SettingsFile;
use crate::error::ConfigError;

/// Name of the settings file, both in the user config directory and in a project root.
pub const CONFIG_FILE_NAME: &str = "yakusoku.toml";

const APP_DIR: &str = "yakusoku";

pub type UserConfigResult<T> = Result<T, ConfigError>;

/// Returns the path to the user configuration file.
///
/// The path is determined by:
/// 1. If $XDG_CONFIG_HOME is set: $XDG_CONFIG_HOME/yakusoku/yakusoku.toml
/// 2. Otherwise: `dirs::config_dir()`/yakusoku/yakusoku.toml
///
/// Returns None if no config directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg_config) if !xdg_config.is_empty() => PathBuf::from(xdg_config),
        _ => dirs::config_dir()?,
    };
    Some(base.join(APP_DIR).join(CONFIG_FILE_NAME))
}

/// Load the user configuration file.
///
/// Returns `Ok(None)` when no user config exists.
pub fn load_user_config() -> UserConfigResult<Option<SettingsFile>> {
    let Some(path) = user_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&path)?;
    let settings = toml::from_str::<SettingsFile>(&contents)?;
    Ok(Some(settings))
}
