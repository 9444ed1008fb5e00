//! Loading the installed extension into a runtime web session.
//!
//! The runtime (a browser engine embedding) is abstracted behind
//! [`SessionRuntime`]. The binder only checks preconditions on disk and turns
//! every runtime failure into a [`BindReport`].

use crate::error::{ExtensionError, Result};
use crate::store::MANIFEST_FILE;
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// Extension as reported by the runtime after a successful load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedExtension {
    /// Runtime-assigned extension id.
    pub id: String,
    /// Extension name.
    pub name: String,
    /// Extension version, if the runtime reports one.
    pub version: Option<String>,
}

/// A host runtime that owns web sessions and can load unpacked extensions.
#[async_trait]
pub trait SessionRuntime: Send + Sync {
    /// Session handle type.
    type Session: Send + Sync;

    /// Resolve (or create) the session for a partition identifier such as
    /// `"persist:account-1"`.
    async fn session_for_partition(&self, partition: &str) -> Result<Self::Session>;

    /// Load the unpacked extension at `path` into `session`.
    async fn load_extension(&self, session: &Self::Session, path: &Path)
    -> Result<LoadedExtension>;
}

/// Either an already-resolved session or a partition to resolve one from.
#[derive(Debug, Clone)]
pub enum SessionTarget<S> {
    /// Resolved session handle.
    Handle(S),
    /// Partition identifier.
    Partition(String),
}

impl<S> From<&str> for SessionTarget<S> {
    fn from(partition: &str) -> Self {
        Self::Partition(partition.to_owned())
    }
}

/// Outcome of a bind attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindReport {
    /// Whether the extension was loaded.
    pub success: bool,
    /// Loaded extension on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<LoadedExtension>,
    /// Failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BindReport {
    fn loaded(extension: LoadedExtension) -> Self {
        Self {
            success: true,
            extension: Some(extension),
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            extension: None,
            error: Some(error.into()),
        }
    }
}

/// Loads an installed extension into runtime sessions.
pub struct SessionBinder<R> {
    runtime: R,
}

impl<R: SessionRuntime> SessionBinder<R> {
    /// Create a binder over `runtime`.
    pub fn new(runtime: R) -> Self {
        Self { runtime }
    }

    /// Returns the underlying runtime.
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Load the extension at `install_path` into `target`.
    ///
    /// Fails without touching the runtime if the directory or its manifest is
    /// missing. Runtime errors are reported, never propagated.
    pub async fn bind(&self, install_path: &Path, target: SessionTarget<R::Session>) -> BindReport {
        if !install_path.exists() {
            info!("extension not found at {}", install_path.display());
            return BindReport::failed("Extension not found");
        }

        let manifest = install_path.join(MANIFEST_FILE);
        if !manifest.is_file() {
            info!("extension manifest not found at {}", manifest.display());
            return BindReport::failed("Extension manifest not found");
        }

        match self.load(install_path, target).await {
            Ok(extension) => {
                info!(id = %extension.id, "extension loaded successfully for session");
                BindReport::loaded(extension)
            }
            Err(e) => {
                warn!("failed to load extension: {e}");
                BindReport::failed(e.to_string())
            }
        }
    }

    async fn load(
        &self,
        install_path: &Path,
        target: SessionTarget<R::Session>,
    ) -> Result<LoadedExtension> {
        let session = match target {
            SessionTarget::Handle(session) => session,
            SessionTarget::Partition(partition) => self
                .runtime
                .session_for_partition(&partition)
                .await
                .map_err(|e| ExtensionError::SessionLoad(format!("partition {partition}: {e}")))?,
        };
        self.runtime.load_extension(&session, install_path).await
    }
}
