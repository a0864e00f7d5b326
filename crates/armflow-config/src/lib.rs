pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{Approval, DEFAULT_APPROVAL_DESCRIPTION, Polling, Settings, Timeouts};

use std::path::{Path, PathBuf};

/// Environment variable pointing directly at a settings file
pub const CONFIG_PATH_ENV: &str = "ARMFLOW_CONFIG_PATH";

/// Get the armflow config directory (`~/.config/armflow`)
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("armflow"))
}

/// Find the settings file
///
/// Search order:
/// 1. `ARMFLOW_CONFIG_PATH` (must exist when set)
/// 2. current directory: armflow.local.yaml, armflow.yaml, .armflow.yaml
/// 3. ~/.config/armflow/settings.yaml
///
/// Returns `Ok(None)` when no file exists; armflow then runs on defaults.
pub fn find_settings_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::ExplicitPathMissing(path));
    }

    let current_dir = std::env::current_dir()?;
    for filename in ["armflow.local.yaml", "armflow.yaml", ".armflow.yaml"] {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("armflow").join("settings.yaml");
        if global.exists() {
            return Ok(Some(global));
        }
    }

    Ok(None)
}

/// Load and validate a settings file
pub fn load_from(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)?;
    let settings: Settings = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    settings.validate()?;
    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Discover and load settings, falling back to defaults
pub fn load_settings() -> Result<Settings> {
    match find_settings_file()? {
        Some(path) => load_from(&path),
        None => {
            tracing::debug!("No settings file found, using defaults");
            Ok(Settings::default())
        }
    }
}
