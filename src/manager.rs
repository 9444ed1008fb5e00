//! Extension lifecycle: install, replace, and load into sessions.
//!
//! [`install_version`] is the single fetch-and-replace core. The manager
//! wraps it in a structured [`FetchReport`] for UI callers, and the
//! command-line binary maps its error to a non-zero exit status.

use crate::config::Config;
use crate::error::Result;
use crate::fetch::{ArtifactFetcher, FetchOutcome, FetchReport};
use crate::session::{BindReport, SessionBinder, SessionRuntime, SessionTarget};
use crate::store::ArtifactStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Fetch `version`, replace the installed copy, and update the store's cached
/// version.
///
/// After a full replace the cache holds `version`. When the archive lacked
/// its expected root and nothing was replaced, the cache is dropped so the
/// next read reflects the disk.
///
/// # Errors
///
/// Propagates any fetch, extraction, or replace failure.
pub async fn install_version(
    store: &ArtifactStore,
    fetcher: &ArtifactFetcher,
    version: &str,
) -> Result<FetchOutcome> {
    let outcome = fetcher
        .fetch_and_replace(version, store.install_path())
        .await?;
    if outcome.replaced {
        store.record_installed(&outcome.version);
    } else {
        store.invalidate();
    }
    Ok(outcome)
}

/// Owns the extension's store, fetcher and session binder.
pub struct ExtensionManager<R> {
    store: Arc<ArtifactStore>,
    fetcher: ArtifactFetcher,
    binder: SessionBinder<R>,
    bundled_version: String,
    enabled: bool,
}

impl<R: SessionRuntime> ExtensionManager<R> {
    /// Build a manager from the startup configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the install layout or HTTP client cannot be set up.
    pub fn new(config: &Config, runtime: R) -> Result<Self> {
        let store = Arc::new(ArtifactStore::from_config(config)?);
        let fetcher = ArtifactFetcher::from_config(config)?;
        Ok(Self::from_parts(config, store, fetcher, SessionBinder::new(runtime)))
    }

    /// Assemble a manager from already-built parts.
    pub fn from_parts(
        config: &Config,
        store: Arc<ArtifactStore>,
        fetcher: ArtifactFetcher,
        binder: SessionBinder<R>,
    ) -> Self {
        if let Some(version) = store.pending_replace() {
            warn!(
                version,
                "a previous extension replace was interrupted; reinstall to recover"
            );
        }
        Self {
            store,
            fetcher,
            binder,
            bundled_version: config.extension.version.clone(),
            enabled: config.extension.enabled,
        }
    }

    /// Shared handle to the store, e.g. for an [`UpdatePoller`](crate::update::UpdatePoller).
    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    /// Installed extension version, if a manifest can be read.
    pub fn installed_version(&self) -> Option<String> {
        self.store.read_installed_version()
    }

    /// Fetch and install `version`.
    ///
    /// # Errors
    ///
    /// Propagates any fetch, extraction, or replace failure.
    pub async fn fetch_version(&self, version: &str) -> Result<FetchOutcome> {
        install_version(&self.store, &self.fetcher, version).await
    }

    /// Fetch and install `version`, reporting failure instead of raising.
    pub async fn download_extension(&self, version: &str) -> FetchReport {
        FetchReport::from_result(&self.fetch_version(version).await)
    }

    /// Install the bundled version if nothing is installed yet.
    ///
    /// Returns `Ok(None)` when an installed copy already exists.
    ///
    /// # Errors
    ///
    /// Propagates any fetch failure.
    pub async fn ensure_installed(&self) -> Result<Option<FetchOutcome>> {
        if self.store.is_installed() && self.store.pending_replace().is_none() {
            return Ok(None);
        }
        info!(
            version = %self.bundled_version,
            "extension missing; installing bundled version"
        );
        self.fetch_version(&self.bundled_version).await.map(Some)
    }

    /// Load the installed extension into `target`.
    pub async fn load_for_session(&self, target: SessionTarget<R::Session>) -> BindReport {
        if !self.enabled {
            return BindReport {
                success: false,
                extension: None,
                error: Some("Extension disabled".to_owned()),
            };
        }
        self.binder.bind(self.store.install_path(), target).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::fetch::ArchiveSource;
    use crate::session::LoadedExtension;
    use crate::store::InstallLayout;
    use crate::test_utils::{extension_zip, write_manifest};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct CountingRuntime {
        loads: AtomicUsize,
    }

    #[async_trait]
    impl SessionRuntime for CountingRuntime {
        type Session = ();

        async fn session_for_partition(&self, _partition: &str) -> Result<()> {
            Ok(())
        }

        async fn load_extension(&self, _session: &(), _path: &Path) -> Result<LoadedExtension> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(LoadedExtension {
                id: "id".to_owned(),
                name: "WA Incognito".to_owned(),
                version: None,
            })
        }
    }

    fn manager(
        base_url: &str,
        root: &Path,
        temp: &Path,
        config: &Config,
    ) -> ExtensionManager<CountingRuntime> {
        let store = Arc::new(ArtifactStore::new(
            InstallLayout::Development {
                source_dir: root.to_path_buf(),
            },
            "wa-incognito",
        ));
        let source = ArchiveSource {
            base_url: base_url.to_owned(),
            ..ArchiveSource::from_config(config)
        };
        let fetcher = ArtifactFetcher::new(source, "test", temp.to_path_buf(), 5).unwrap();
        ExtensionManager::from_parts(
            config,
            store,
            fetcher,
            SessionBinder::new(CountingRuntime::default()),
        )
    }

    async fn serve(server: &MockServer, version: &str) {
        Mock::given(method("GET"))
            .and(path(format!(
                "/tomer8007/whatsapp-web-incognito/archive/refs/tags/v{version}.zip"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(extension_zip(
                &format!("whatsapp-web-incognito-{version}"),
                version,
            )))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn fetch_then_read_returns_new_version() {
        let server = MockServer::start().await;
        serve(&server, "2.5.0").await;
        let root = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let m = manager(&server.uri(), root.path(), temp.path(), &Config::default());

        write_manifest(m.store().install_path(), "2.4.1");
        assert_eq!(m.installed_version().as_deref(), Some("2.4.1"));

        let report = m.download_extension("2.5.0").await;
        assert!(report.success, "{report:?}");
        assert_eq!(report.version.as_deref(), Some("2.5.0"));
        assert_eq!(m.installed_version().as_deref(), Some("2.5.0"));
    }

    #[tokio::test]
    async fn failed_download_reports_error() {
        let server = MockServer::start().await;
        let root = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let m = manager(&server.uri(), root.path(), temp.path(), &Config::default());
        write_manifest(m.store().install_path(), "2.4.1");

        let report = m.download_extension("9.9.9").await;
        assert!(!report.success);
        assert!(report.error.unwrap().contains("HTTP 404"));
        assert_eq!(m.installed_version().as_deref(), Some("2.4.1"));
    }

    #[tokio::test]
    async fn ensure_installed_downloads_bundled_version_once() {
        let server = MockServer::start().await;
        serve(&server, "2.4.1").await;
        let root = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let m = manager(&server.uri(), root.path(), temp.path(), &Config::default());

        let first = m.ensure_installed().await.unwrap();
        assert!(first.is_some_and(|o| o.replaced));
        assert_eq!(m.installed_version().as_deref(), Some("2.4.1"));

        let second = m.ensure_installed().await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn load_for_session_binds_installed_extension() {
        let server = MockServer::start().await;
        let root = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let m = manager(&server.uri(), root.path(), temp.path(), &Config::default());
        write_manifest(m.store().install_path(), "2.4.1");

        let report = m.load_for_session("persist:main".into()).await;
        assert!(report.success);
        assert_eq!(m.binder.runtime().loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_extension_is_not_loaded() {
        let server = MockServer::start().await;
        let root = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.extension.enabled = false;
        let m = manager(&server.uri(), root.path(), temp.path(), &config);
        write_manifest(m.store().install_path(), "2.4.1");

        let report = m.load_for_session("persist:main".into()).await;
        assert!(!report.success);
        assert_eq!(m.binder.runtime().loads.load(Ordering::SeqCst), 0);
    }
}
