//! Config file resolution for plexshare
//!
//! # Environment Variables
//!
//! - `PLEXSHARE_CONFIG` - Path to the config file (e.g., `~/dotfiles/plexshare.toml`)
//!
//! # Resolution Priority
//!
//! For config_file():
//! 1. `--config` flag
//! 2. `PLEXSHARE_CONFIG` environment variable
//! 3. `XDG_CONFIG_HOME/plexshare/config.toml` (if set)
//! 4. Platform default:
//!    - Windows: `%APPDATA%\plexshare\config.toml`
//!    - macOS/Linux: `~/.config/plexshare/config.toml`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config file override
pub const ENV_CONFIG: &str = "PLEXSHARE_CONFIG";

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

const APP_DIR: &str = "plexshare";

/// Resolve the config file path
///
/// Priority:
/// 1. Explicit path (from `--config`)
/// 2. `PLEXSHARE_CONFIG` env var
/// 3. `XDG_CONFIG_HOME/plexshare/config.toml`
/// 4. Platform default
pub fn config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    // 1. Command line
    if let Some(path) = explicit {
        let path = expand_path(&path.to_string_lossy());
        log::debug!("Using config file from --config: {}", path.display());
        return Ok(path);
    }

    // 2. Environment variable override
    if let Ok(file) = std::env::var(ENV_CONFIG) {
        let path = expand_path(&file);
        log::debug!("Using config file from {}: {}", ENV_CONFIG, path.display());
        return Ok(path);
    }

    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Get the plexshare config directory path
pub fn config_dir() -> Result<PathBuf> {
    // XDG_CONFIG_HOME first, on every platform
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join(APP_DIR);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            let path = app_data.join(APP_DIR);
            log::debug!("Using Windows config dir: {}", path.display());
            return Ok(path);
        }
    }

    // Unix default: ~/.config/plexshare
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join(APP_DIR);
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Expand `~` and environment variables in a path
pub fn expand_path(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| shellexpand::tilde(path).into_owned());
    PathBuf::from(expanded)
}
