//! On-disk location and installed version of the managed extension.
//!
//! The install path is fixed for the lifetime of the process and computed
//! once. The installed version is read lazily from `manifest.json` and cached
//! until a fetch-and-replace records a new one.

use crate::config::{Config, LayoutMode, Platform};
use crate::error::{ExtensionError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};
use tracing::{debug, warn};

/// Manifest file every extension directory must contain.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Subset of a WebExtension `manifest.json` this crate reads.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionManifest {
    /// Declared extension version.
    pub version: Option<String>,
}

/// Where the extension directory is rooted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallLayout {
    /// Packaged bundle: `<resources_dir>/app.asar.unpacked/src/extensions/<dir>`.
    Packaged {
        /// Bundle resources directory.
        resources_dir: PathBuf,
    },
    /// Source checkout: `<source_dir>/extensions/<dir>`.
    Development {
        /// Source directory.
        source_dir: PathBuf,
    },
}

impl InstallLayout {
    /// Resolve the layout described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if a packaged layout has no explicit resources
    /// directory and the running executable's location cannot be determined.
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.layout.mode {
            LayoutMode::Packaged => {
                let resources_dir = match &config.layout.resources_dir {
                    Some(dir) => dir.clone(),
                    None => Self::detect_resources_dir(config.platform)?,
                };
                Ok(Self::Packaged { resources_dir })
            }
            LayoutMode::Development => Ok(Self::Development {
                source_dir: config
                    .layout
                    .source_dir
                    .clone()
                    .unwrap_or_else(crate::paths::data_dir),
            }),
        }
    }

    /// Derive a bundle's resources directory from the running executable.
    ///
    /// - macOS: `<App>.app/Contents/MacOS/<exe>` → `<App>.app/Contents/Resources`
    /// - Linux/Windows: `<install>/<exe>` → `<install>/resources`
    ///
    /// # Errors
    ///
    /// Returns an error if the executable path cannot be determined.
    pub fn detect_resources_dir(platform: Platform) -> Result<PathBuf> {
        let exe = std::env::current_exe().map_err(|e| {
            ExtensionError::Config(format!("cannot determine current executable path: {e}"))
        })?;
        let exe_dir = exe.parent().ok_or_else(|| {
            ExtensionError::Config(format!("executable has no parent: {}", exe.display()))
        })?;
        Ok(match platform {
            Platform::Macos => exe_dir.join("..").join("Resources"),
            Platform::Linux | Platform::Windows => exe_dir.join("resources"),
        })
    }

    /// Path of the extension directory named `dir_name` under this layout.
    pub fn extension_path(&self, dir_name: &str) -> PathBuf {
        match self {
            Self::Packaged { resources_dir } => resources_dir
                .join("app.asar.unpacked")
                .join("src")
                .join("extensions")
                .join(dir_name),
            Self::Development { source_dir } => source_dir.join("extensions").join(dir_name),
        }
    }
}

/// Knows where the extension is installed and which version it is.
#[derive(Debug)]
pub struct ArtifactStore {
    layout: InstallLayout,
    dir_name: String,
    install_path: OnceLock<PathBuf>,
    installed_version: Mutex<Option<String>>,
}

impl ArtifactStore {
    /// Create a store for the extension directory `dir_name` under `layout`.
    pub fn new(layout: InstallLayout, dir_name: impl Into<String>) -> Self {
        Self {
            layout,
            dir_name: dir_name.into(),
            install_path: OnceLock::new(),
            installed_version: Mutex::new(None),
        }
    }

    /// Create a store from the startup configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the install layout cannot be resolved.
    pub fn from_config(config: &Config) -> Result<Self> {
        let layout = InstallLayout::from_config(config)?;
        Ok(Self::new(layout, config.extension.dir_name.clone()))
    }

    /// Returns the install layout.
    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    /// Directory the extension is installed in. Computed once.
    pub fn install_path(&self) -> &Path {
        self.install_path
            .get_or_init(|| self.layout.extension_path(&self.dir_name))
    }

    /// Path of the installed `manifest.json`.
    pub fn manifest_path(&self) -> PathBuf {
        self.install_path().join(MANIFEST_FILE)
    }

    /// Returns `true` if the install directory holds a manifest.
    pub fn is_installed(&self) -> bool {
        self.manifest_path().is_file()
    }

    /// Version declared by the installed manifest.
    ///
    /// Returns `None` when the manifest is absent or unreadable, or when its
    /// version is missing or blank. Failures are logged and never cached, so a later call reads
    /// the file again. A successful read is cached.
    pub fn read_installed_version(&self) -> Option<String> {
        let mut cached = self
            .installed_version
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(version) = cached.as_ref() {
            return Some(version.clone());
        }

        let manifest_path = self.manifest_path();
        if !manifest_path.is_file() {
            debug!("no extension manifest at {}", manifest_path.display());
            return None;
        }

        match read_manifest(&manifest_path) {
            Ok(manifest) => {
                let version = manifest.version.filter(|v| !v.trim().is_empty());
                if version.is_none() {
                    debug!("extension manifest declares no version");
                }
                *cached = version.clone();
                version
            }
            Err(e) => {
                warn!("failed to read extension version: {e}");
                None
            }
        }
    }

    /// Record `version` as installed after a successful replace.
    pub fn record_installed(&self, version: &str) {
        *self
            .installed_version
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(version.to_owned());
    }

    /// Drop the cached version so the next read goes to disk.
    pub fn invalidate(&self) {
        *self
            .installed_version
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Marker file written while a replace of this install path is in flight.
    pub fn pending_marker_path(&self) -> PathBuf {
        pending_marker_for(self.install_path())
    }

    /// Version of an interrupted replace, if the previous run crashed between
    /// removing the old directory and moving the new one into place.
    pub fn pending_replace(&self) -> Option<String> {
        let marker = self.pending_marker_path();
        let version = std::fs::read_to_string(&marker).ok()?;
        let version = version.trim();
        if version.is_empty() {
            None
        } else {
            Some(version.to_owned())
        }
    }
}

/// Parse a `manifest.json` file.
///
/// # Errors
///
/// Returns [`ExtensionError::Manifest`] if the file cannot be read or parsed.
pub fn read_manifest(path: &Path) -> Result<ExtensionManifest> {
    let bytes = std::fs::read(path).map_err(|e| {
        ExtensionError::Manifest(format!("cannot read {}: {e}", path.display()))
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ExtensionError::Manifest(format!("cannot parse {}: {e}", path.display())))
}

/// `<parent>/.<dir>.pending` for an install path `<parent>/<dir>`.
pub(crate) fn pending_marker_for(install_path: &Path) -> PathBuf {
    let name = install_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "extension".to_owned());
    let parent = install_path.parent().unwrap_or(install_path);
    parent.join(format!(".{name}.pending"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::build_config;

    fn dev_store(root: &Path) -> ArtifactStore {
        ArtifactStore::new(
            InstallLayout::Development {
                source_dir: root.to_path_buf(),
            },
            "wa-incognito",
        )
    }

    fn write_manifest(store: &ArtifactStore, body: &str) {
        std::fs::create_dir_all(store.install_path()).unwrap();
        std::fs::write(store.manifest_path(), body).unwrap();
    }

    #[test]
    fn packaged_layout_path() {
        let layout = InstallLayout::Packaged {
            resources_dir: PathBuf::from("/opt/app/resources"),
        };
        assert_eq!(
            layout.extension_path("wa-incognito"),
            PathBuf::from("/opt/app/resources/app.asar.unpacked/src/extensions/wa-incognito")
        );
    }

    #[test]
    fn development_layout_path() {
        let layout = InstallLayout::Development {
            source_dir: PathBuf::from("/src/app"),
        };
        assert_eq!(
            layout.extension_path("wa-incognito"),
            PathBuf::from("/src/app/extensions/wa-incognito")
        );
    }

    #[test]
    fn layout_from_config_uses_explicit_dirs() {
        let mut config = build_config("en-US", Platform::Linux);
        config.layout.mode = LayoutMode::Packaged;
        config.layout.resources_dir = Some(PathBuf::from("/r"));
        assert_eq!(
            InstallLayout::from_config(&config).unwrap(),
            InstallLayout::Packaged {
                resources_dir: PathBuf::from("/r")
            }
        );

        config.layout.mode = LayoutMode::Development;
        config.layout.source_dir = Some(PathBuf::from("/s"));
        assert_eq!(
            InstallLayout::from_config(&config).unwrap(),
            InstallLayout::Development {
                source_dir: PathBuf::from("/s")
            }
        );
    }

    #[test]
    fn detected_resources_dir_is_platform_specific() {
        let mac = InstallLayout::detect_resources_dir(Platform::Macos).unwrap();
        assert!(mac.ends_with("Resources"));
        let linux = InstallLayout::detect_resources_dir(Platform::Linux).unwrap();
        assert!(linux.ends_with("resources"));
    }

    #[test]
    fn install_path_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let store = dev_store(dir.path());
        let first = store.install_path().to_path_buf();
        assert_eq!(store.install_path(), first.as_path());
        assert!(first.ends_with("extensions/wa-incognito"));
    }

    #[test]
    fn missing_manifest_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = dev_store(dir.path());
        assert!(!store.is_installed());
        assert_eq!(store.read_installed_version(), None);
    }

    #[test]
    fn reads_and_caches_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = dev_store(dir.path());
        write_manifest(&store, r#"{"name":"WA Incognito","version":"2.4.1","manifest_version":3}"#);

        assert_eq!(store.read_installed_version().as_deref(), Some("2.4.1"));

        // Cached: a changed file is not observed until invalidated.
        write_manifest(&store, r#"{"version":"9.9.9"}"#);
        assert_eq!(store.read_installed_version().as_deref(), Some("2.4.1"));

        store.invalidate();
        assert_eq!(store.read_installed_version().as_deref(), Some("9.9.9"));
    }

    #[test]
    fn malformed_manifest_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let store = dev_store(dir.path());
        write_manifest(&store, "{ not json");
        assert_eq!(store.read_installed_version(), None);

        write_manifest(&store, r#"{"version":"2.4.2"}"#);
        assert_eq!(store.read_installed_version().as_deref(), Some("2.4.2"));
    }

    #[test]
    fn blank_manifest_version_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = dev_store(dir.path());
        write_manifest(&store, r#"{"version":"  "}"#);
        assert_eq!(store.read_installed_version(), None);

        write_manifest(&store, r#"{"version":"2.4.3"}"#);
        assert_eq!(store.read_installed_version().as_deref(), Some("2.4.3"));
    }

    #[test]
    fn manifest_without_version_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = dev_store(dir.path());
        write_manifest(&store, r#"{"name":"no version"}"#);
        assert_eq!(store.read_installed_version(), None);
    }

    #[test]
    fn record_installed_overrides_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = dev_store(dir.path());
        write_manifest(&store, r#"{"version":"2.4.1"}"#);
        assert_eq!(store.read_installed_version().as_deref(), Some("2.4.1"));
        store.record_installed("2.5.0");
        assert_eq!(store.read_installed_version().as_deref(), Some("2.5.0"));
    }

    #[test]
    fn pending_marker_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = dev_store(dir.path());
        assert_eq!(store.pending_replace(), None);

        let marker = store.pending_marker_path();
        assert!(marker.ends_with(".wa-incognito.pending"));
        std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
        std::fs::write(&marker, "2.5.0\n").unwrap();
        assert_eq!(store.pending_replace().as_deref(), Some("2.5.0"));
    }

    #[test]
    fn read_manifest_reports_manifest_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        std::fs::write(&path, "42").unwrap();
        let err = read_manifest(&path).unwrap_err();
        assert!(matches!(err, ExtensionError::Manifest(_)));
    }
}
