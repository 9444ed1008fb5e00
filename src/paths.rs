//! Centralized filesystem locations used outside the extension install tree.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Config | `~/Library/Application Support/extkeep/` | `~/.config/extkeep/` |
//! | Data | `~/Library/Application Support/extkeep/` | `~/.local/share/extkeep/` |
//!
//! # Environment Overrides
//!
//! - `EXTKEEP_CONFIG_DIR` — overrides [`config_dir`]
//! - `EXTKEEP_DATA_DIR` — overrides [`data_dir`]
//! - `EXTKEEP_TEMP_DIR` — overrides [`temp_dir`]

use std::path::PathBuf;

/// Application config directory.
///
/// Holds `config.toml` and the persisted update state. Resolves to
/// `dirs::config_dir()/extkeep/` unless `EXTKEEP_CONFIG_DIR` is set.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("EXTKEEP_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("extkeep"))
        .unwrap_or_else(|| PathBuf::from("/tmp/extkeep-config"))
}

/// Application data root directory.
///
/// Used as the development-layout source directory when the host does not
/// supply one. Override with `EXTKEEP_DATA_DIR`.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("EXTKEEP_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("extkeep"))
        .unwrap_or_else(|| PathBuf::from("/tmp/extkeep-data"))
}

/// Directory for downloaded archives before extraction.
#[must_use]
pub fn temp_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("EXTKEEP_TEMP_DIR") {
        return PathBuf::from(override_dir);
    }
    std::env::temp_dir()
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Durable key-value state file (`config_dir()/state.json`).
#[must_use]
pub fn state_file() -> PathBuf {
    config_dir().join("state.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_live_under_config_dir() {
        assert!(config_file().starts_with(config_dir()));
        assert!(state_file().starts_with(config_dir()));
        assert!(state_file().ends_with("state.json"));
    }

    #[test]
    fn default_dirs_are_namespaced() {
        if std::env::var_os("EXTKEEP_CONFIG_DIR").is_none() {
            assert!(config_dir().to_string_lossy().contains("extkeep"));
        }
        if std::env::var_os("EXTKEEP_DATA_DIR").is_none() {
            assert!(data_dir().to_string_lossy().contains("extkeep"));
        }
    }
}
