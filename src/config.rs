//! Configuration for the extension lifecycle manager.
//!
//! A [`Config`] is built once at startup (see [`build_config`]) and passed by
//! reference to every component. Nothing mutates it afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Host operating system family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Linux and other Unix desktops.
    #[default]
    Linux,
    /// macOS.
    Macos,
    /// Windows.
    Windows,
}

impl Platform {
    /// Platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::Macos
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::Macos => write!(f, "macos"),
            Self::Windows => write!(f, "windows"),
        }
    }
}

/// Whether the host runs from a packaged bundle or a source checkout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    /// Installed bundle; the extension lives under the resources directory.
    Packaged,
    /// Source checkout; the extension lives under the source directory.
    #[default]
    Development,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// UI locale reported by the host (e.g. `"en-US"`, `"pt-BR"`).
    pub locale: String,
    /// Host platform.
    pub platform: Platform,
    /// Packaged vs. development install layout.
    pub layout: LayoutConfig,
    /// The managed browser extension.
    pub extension: ExtensionConfig,
    /// The host application itself.
    pub app: AppConfig,
    /// Remote update check settings.
    pub updates: UpdateConfig,
}

/// Where the extension directory is rooted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Packaged or development layout.
    pub mode: LayoutMode,
    /// Packaged resources directory (None = derived from the executable).
    pub resources_dir: Option<PathBuf>,
    /// Development source directory (None = application data dir).
    pub source_dir: Option<PathBuf>,
}

/// The managed browser extension artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionConfig {
    /// Whether the extension should be loaded at all.
    pub enabled: bool,
    /// Display name carried on update notices.
    pub name: String,
    /// Directory name of the installed extension.
    pub dir_name: String,
    /// Project name; archives unpack to `<project_name>-<version>/`.
    pub project_name: String,
    /// GitHub repository in `owner/repo` form.
    pub repo: String,
    /// Version bundled with the host, used when no manifest can be read.
    pub version: String,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: "Extension".to_owned(),
            dir_name: "wa-incognito".to_owned(),
            project_name: "whatsapp-web-incognito".to_owned(),
            repo: "tomer8007/whatsapp-web-incognito".to_owned(),
            version: "2.4.1".to_owned(),
        }
    }
}

/// The host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Display name carried on update notices.
    pub name: String,
    /// Running application version.
    pub version: String,
    /// GitHub repository in `owner/repo` form.
    pub repo: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "WhatsApp Electron".to_owned(),
            version: "1.2.5".to_owned(),
            repo: "dagmoller/whatsapp-electron".to_owned(),
        }
    }
}

/// Remote update check configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Minimum hours between two update checks.
    pub check_interval_hours: u64,
    /// Base URL of the releases API.
    pub api_base: String,
    /// Base URL archives are downloaded from.
    pub archive_base: String,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Maximum redirect hops followed when downloading an archive.
    pub max_redirects: usize,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            check_interval_hours: 24,
            api_base: "https://api.github.com".to_owned(),
            archive_base: "https://github.com".to_owned(),
            user_agent: "WhatsApp-Electron".to_owned(),
            max_redirects: 5,
        }
    }
}

/// Build the startup configuration for a locale and platform.
///
/// Pure: the same inputs always give the same [`Config`].
pub fn build_config(locale: &str, platform: Platform) -> Config {
    Config {
        locale: locale.to_owned(),
        platform,
        ..Config::default()
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::ExtensionError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ExtensionError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> PathBuf {
        crate::paths::config_file()
    }

    /// Update check interval in milliseconds.
    pub fn check_interval_ms(&self) -> i64 {
        let hours = i64::try_from(self.updates.check_interval_hours).unwrap_or(i64::MAX);
        hours.saturating_mul(60 * 60 * 1000)
    }
}
