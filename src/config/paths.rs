//! XDG Base Directory locations for the configuration file.

use std::path::PathBuf;

/// `$XDG_CONFIG_HOME`, or `$HOME/.config` when unset.
pub fn config_home() -> Option<PathBuf> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config_home.is_empty() {
            return Some(PathBuf::from(xdg_config_home));
        }
    }
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config"))
}

/// `$XDG_CONFIG_HOME/treesync/config.toml`
pub fn default_config_file() -> Option<PathBuf> {
    config_home().map(|home| home.join("treesync").join("config.toml"))
}
