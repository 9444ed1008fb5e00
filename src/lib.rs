//! extkeep: lifecycle manager for a versioned browser extension.
//!
//! Keeps an unpacked browser extension installed next to a host application,
//! replaces it with tagged GitHub archives on demand, loads it into the host's
//! web sessions, and periodically checks GitHub for newer releases of both the
//! extension and the host.
//!
//! # Architecture
//!
//! - **version**: dotted version comparison
//! - **store**: install path and cached installed version
//! - **fetch**: download, unpack and replace an archive
//! - **session**: load the installed extension into a runtime session
//! - **update**: throttled release checks and notifications
//! - **manager**: ties store, fetcher and binder together

pub mod config;
pub mod error;
pub mod fetch;
pub mod manager;
pub mod paths;
pub mod session;
pub mod store;
pub mod update;
pub mod version;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{Config, Platform, build_config};
pub use error::{ExtensionError, Result};
pub use fetch::{ArtifactFetcher, FetchOutcome, FetchReport, FetchStage};
pub use manager::{ExtensionManager, install_version};
pub use session::{BindReport, SessionBinder, SessionRuntime, SessionTarget};
pub use store::{ArtifactStore, InstallLayout};
pub use update::{UpdateCheckResult, UpdatePoller};
pub use version::compare_versions;
