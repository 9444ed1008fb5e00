//! Download, unpack, and install a specific extension version.
//!
//! One fetch-and-replace walks through [`FetchStage`]s:
//!
//! ```text
//! Idle → Downloading → Extracting → Replacing → Done
//!              ↘            ↘            ↘
//!                         Failed
//! ```
//!
//! Archives unpack into a hidden `.<dir>-<version>.extract` directory next to
//! the install path, removed once the fetch ends whatever its outcome.
//!
//! The replace step is not transactional: the old directory is removed before
//! the new one is moved into place. A marker file next to the install path
//! records the version being installed while that window is open, so the next
//! start can detect an interrupted replace (see
//! [`ArtifactStore::pending_replace`](crate::store::ArtifactStore::pending_replace)).

use crate::config::Config;
use crate::error::{ExtensionError, Result};
use crate::store::pending_marker_for;
use futures_util::StreamExt;
use serde::Serialize;
use std::io::Read as _;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Stage of a fetch-and-replace operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStage {
    /// Nothing started yet.
    Idle,
    /// Streaming the archive to a temporary file.
    Downloading,
    /// Unpacking the archive next to the install path.
    Extracting,
    /// Swapping the unpacked directory into the install path.
    Replacing,
    /// Finished successfully.
    Done,
    /// Aborted; the temporary archive has been removed.
    Failed,
}

impl std::fmt::Display for FetchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Downloading => "downloading",
            Self::Extracting => "extracting",
            Self::Replacing => "replacing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What a successful fetch-and-replace did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Version that was fetched.
    pub version: String,
    /// Install path that was targeted.
    pub install_path: PathBuf,
    /// `false` when the archive did not contain the expected root folder and
    /// the install path was left untouched.
    pub replaced: bool,
}

/// Structured fetch result for callers that display errors instead of
/// propagating them (e.g. a settings screen).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    /// Whether the fetch succeeded.
    pub success: bool,
    /// Installed version on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Human-readable failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchReport {
    /// Convert a fetch result into a report.
    pub fn from_result(result: &Result<FetchOutcome>) -> Self {
        match result {
            Ok(outcome) => Self {
                success: true,
                version: Some(outcome.version.clone()),
                error: None,
            },
            Err(e) => Self {
                success: false,
                version: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Where archives come from and how they unpack.
#[derive(Debug, Clone)]
pub struct ArchiveSource {
    /// Archive host base URL (e.g. `https://github.com`).
    pub base_url: String,
    /// Repository in `owner/repo` form.
    pub repo: String,
    /// Archives unpack to `<project_name>-<version>/`.
    pub project_name: String,
    /// Prefix of the temporary archive file name.
    pub file_stem: String,
}

impl ArchiveSource {
    /// Source for the extension described by `config`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.updates.archive_base.clone(),
            repo: config.extension.repo.clone(),
            project_name: config.extension.project_name.clone(),
            file_stem: config.extension.dir_name.clone(),
        }
    }

    /// Tag archive URL for `version`.
    pub fn archive_url(&self, version: &str) -> String {
        format!(
            "{}/{}/archive/refs/tags/v{version}.zip",
            self.base_url.trim_end_matches('/'),
            self.repo
        )
    }

    /// Root folder name inside the archive for `version`.
    pub fn archive_root(&self, version: &str) -> String {
        format!("{}-{version}", self.project_name)
    }
}

/// Downloads tag archives and swaps them into an install path.
#[derive(Debug, Clone)]
pub struct ArtifactFetcher {
    client: reqwest::Client,
    source: ArchiveSource,
    temp_dir: PathBuf,
    max_redirects: usize,
}

impl ArtifactFetcher {
    /// Create a fetcher.
    ///
    /// Redirects are followed by the fetcher itself, so the client is built
    /// with redirects disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        source: ArchiveSource,
        user_agent: &str,
        temp_dir: PathBuf,
        max_redirects: usize,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ExtensionError::Network(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            source,
            temp_dir,
            max_redirects,
        })
    }

    /// Create a fetcher from the startup configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            ArchiveSource::from_config(config),
            &config.updates.user_agent,
            crate::paths::temp_dir(),
            config.updates.max_redirects,
        )
    }

    /// Returns the archive source.
    pub fn source(&self) -> &ArchiveSource {
        &self.source
    }

    /// Temporary archive path for `version`. Unique per version, so fetches
    /// of different versions never share a file.
    pub fn temp_archive_path(&self, version: &str) -> PathBuf {
        self.temp_dir
            .join(format!("{}-{version}.zip", self.source.file_stem))
    }

    /// Download `version` and replace the directory at `install_path` with it.
    ///
    /// On failure the temporary archive is removed and the install path is
    /// left as the failing stage left it; there is no rollback.
    ///
    /// # Errors
    ///
    /// Returns [`ExtensionError::Network`] for download failures, and
    /// [`ExtensionError::Extraction`] or [`ExtensionError::Io`] when the
    /// archive cannot be unpacked or moved into place.
    pub async fn fetch_and_replace(
        &self,
        version: &str,
        install_path: &Path,
    ) -> Result<FetchOutcome> {
        let temp_path = self.temp_archive_path(version);
        let mut stage = FetchStage::Idle;

        let result = self
            .run_stages(version, install_path, &temp_path, &mut stage)
            .await;

        if temp_path.exists()
            && let Err(e) = tokio::fs::remove_file(&temp_path).await
        {
            warn!("cannot remove temporary archive {}: {e}", temp_path.display());
        }

        match &result {
            Ok(outcome) => {
                advance(&mut stage, FetchStage::Done);
                info!(
                    version = %outcome.version,
                    replaced = outcome.replaced,
                    "extension fetched to {}",
                    outcome.install_path.display()
                );
            }
            Err(e) => {
                warn!(version, failed_during = %stage, "failed to download extension: {e}");
                advance(&mut stage, FetchStage::Failed);
            }
        }
        result
    }

    async fn run_stages(
        &self,
        version: &str,
        install_path: &Path,
        temp_path: &Path,
        stage: &mut FetchStage,
    ) -> Result<FetchOutcome> {
        advance(stage, FetchStage::Downloading);
        let url = self.source.archive_url(version);
        info!("downloading extension from {url}");
        self.download(&url, temp_path).await?;

        advance(stage, FetchStage::Extracting);
        let parent = install_path
            .parent()
            .ok_or_else(|| {
                ExtensionError::Extraction(format!(
                    "install path has no parent: {}",
                    install_path.display()
                ))
            })?
            .to_path_buf();
        let staging = parent.join(format!(".{}-{version}.extract", self.source.file_stem));
        info!("extracting extension to {}", staging.display());

        let result = self
            .unpack_and_replace(version, install_path, temp_path, &staging, stage)
            .await;

        if staging.exists()
            && let Err(e) = tokio::fs::remove_dir_all(&staging).await
        {
            warn!("cannot remove staging directory {}: {e}", staging.display());
        }

        let replaced = result?;
        Ok(FetchOutcome {
            version: version.to_owned(),
            install_path: install_path.to_path_buf(),
            replaced,
        })
    }

    /// Unpack into `staging` and move the archive root over `install_path`.
    ///
    /// Returns `false` when the archive has no `<project>-<version>/` root.
    async fn unpack_and_replace(
        &self,
        version: &str,
        install_path: &Path,
        temp_path: &Path,
        staging: &Path,
        stage: &mut FetchStage,
    ) -> Result<bool> {
        {
            let archive = temp_path.to_path_buf();
            let dest = staging.to_path_buf();
            run_blocking(move || {
                if dest.exists() {
                    std::fs::remove_dir_all(&dest)?;
                }
                extract_archive(&archive, &dest)
            })
            .await?;
        }

        let extracted = staging.join(self.source.archive_root(version));
        if !extracted.is_dir() {
            let err = ExtensionError::Extraction(format!(
                "archive did not contain {}",
                self.source.archive_root(version)
            ));
            warn!("{err}; leaving {} untouched", install_path.display());
            return Ok(false);
        }

        advance(stage, FetchStage::Replacing);
        let target = install_path.to_path_buf();
        let version = version.to_owned();
        run_blocking(move || replace_install(&extracted, &target, &version)).await?;
        Ok(true)
    }

    /// Stream `url` to `dest`, following redirects up to the configured bound.
    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let mut current = reqwest::Url::parse(url)
            .map_err(|e| ExtensionError::Network(format!("invalid URL {url}: {e}")))?;

        for _ in 0..=self.max_redirects {
            let resp = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| ExtensionError::Network(format!("request to {current} failed: {e}")))?;
            let status = resp.status();

            if status.is_redirection() {
                let location = resp
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        ExtensionError::Network(format!("HTTP {} without Location header", status.as_u16()))
                    })?;
                current = current.join(location).map_err(|e| {
                    ExtensionError::Network(format!("invalid redirect target {location}: {e}"))
                })?;
                debug!("following redirect to {current}");
                continue;
            }

            if status != reqwest::StatusCode::OK {
                return Err(ExtensionError::Network(format!("HTTP {}", status.as_u16())));
            }

            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let mut file = tokio::fs::File::create(dest).await?;
            let mut stream = resp.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk
                    .map_err(|e| ExtensionError::Network(format!("download interrupted: {e}")))?;
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            return Ok(());
        }

        Err(ExtensionError::Network("too many redirects".to_owned()))
    }
}

fn advance(stage: &mut FetchStage, next: FetchStage) {
    debug!(from = %stage, to = %next, "fetch stage");
    *stage = next;
}

async fn run_blocking<F>(f: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ExtensionError::Extraction(format!("blocking task failed: {e}")))?
}

/// Unpack every entry of the zip at `archive` under `dest`.
///
/// Entries whose names would escape `dest` are skipped.
fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let file = std::fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| ExtensionError::Extraction(format!("cannot open archive: {e}")))?;

    std::fs::create_dir_all(dest)?;
    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| ExtensionError::Extraction(format!("cannot read entry {i}: {e}")))?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("skipping unsafe archive entry {}", entry.name());
            continue;
        };
        let out = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut buf = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry.read_to_end(&mut buf)?;
        std::fs::write(&out, buf)?;
    }
    Ok(())
}

/// Remove whatever is at `install_path` and move `extracted` into its place.
fn replace_install(extracted: &Path, install_path: &Path, version: &str) -> Result<()> {
    let marker = pending_marker_for(install_path);
    std::fs::write(&marker, version)?;

    if install_path.exists() {
        std::fs::remove_dir_all(install_path)?;
    }
    std::fs::rename(extracted, install_path)?;

    if let Err(e) = std::fs::remove_file(&marker) {
        warn!("cannot remove pending marker {}: {e}", marker.display());
    }
    Ok(())
}
