//! Throttled update checks for the extension and the host application.
//!
//! A check cycle looks up both latest releases concurrently, compares them
//! with the running versions, records the check time, and optionally
//! notifies. The persisted timestamp is written on every cycle, successful or
//! not, so a sustained outage does not turn into a retry storm.

use super::checker::{ReleaseInfo, UpdateChecker};
use super::notify::{ArtifactKind, Notifier, UpdateNotice, deliver};
use super::state::{LAST_UPDATE_CHECK_KEY, StateStore};
use crate::config::Config;
use crate::store::ArtifactStore;
use crate::version::version_is_newer;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Source of the current time in epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Version status of one artifact after a check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactStatus {
    /// Running / installed version.
    pub current: Option<String>,
    /// Latest published version, `None` if the lookup failed.
    pub latest: Option<String>,
    /// `true` iff `latest` is known and newer than `current`.
    pub update_available: bool,
    /// Release page of `latest`.
    pub release_url: Option<String>,
}

impl ArtifactStatus {
    fn resolve(current: Option<String>, release: Option<ReleaseInfo>) -> Self {
        let Some(release) = release else {
            return Self {
                current,
                ..Self::default()
            };
        };
        let update_available = version_is_newer(current.as_deref().unwrap_or(""), &release.version);
        Self {
            current,
            latest: Some(release.version),
            update_available,
            release_url: release.release_url,
        }
    }

    fn notice(&self, kind: ArtifactKind, name: &str) -> Option<UpdateNotice> {
        if !self.update_available {
            return None;
        }
        Some(UpdateNotice {
            kind,
            name: name.to_owned(),
            current: self.current.clone().unwrap_or_default(),
            latest: self.latest.clone()?,
            url: self.release_url.clone(),
        })
    }
}

/// Outcome of one check cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateCheckResult {
    /// The managed extension.
    pub extension: ArtifactStatus,
    /// The host application.
    pub app: ArtifactStatus,
    /// When the cycle ran.
    pub checked_at: DateTime<Utc>,
}

impl UpdateCheckResult {
    /// Returns `true` if either artifact has an update.
    pub fn any_update(&self) -> bool {
        self.extension.update_available || self.app.update_available
    }
}

/// Decides when to check for updates and performs the checks.
pub struct UpdatePoller {
    store: Arc<ArtifactStore>,
    checker: UpdateChecker,
    state: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    extension_name: String,
    extension_repo: String,
    extension_fallback: String,
    app_name: String,
    app_repo: String,
    app_version: String,
    interval_ms: i64,
}

impl UpdatePoller {
    /// Create a poller for the artifacts described by `config`.
    ///
    /// Notifications go to [`LogNotifier`](super::notify::LogNotifier) and time
    /// comes from [`SystemClock`] until overridden.
    pub fn new(
        config: &Config,
        store: Arc<ArtifactStore>,
        checker: UpdateChecker,
        state: Arc<dyn StateStore>,
    ) -> Self {
        let app_version = if config.app.version.is_empty() {
            env!("CARGO_PKG_VERSION").to_owned()
        } else {
            config.app.version.clone()
        };
        Self {
            store,
            checker,
            state,
            notifier: Arc::new(super::notify::LogNotifier),
            clock: Arc::new(SystemClock),
            extension_name: config.extension.name.clone(),
            extension_repo: config.extension.repo.clone(),
            extension_fallback: config.extension.version.clone(),
            app_name: config.app.name.clone(),
            app_repo: config.app.repo.clone(),
            app_version,
            interval_ms: config.check_interval_ms(),
        }
    }

    /// Use `notifier` for update notices.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Use `clock` as the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Epoch milliseconds of the last recorded check.
    pub fn last_check(&self) -> Option<i64> {
        match self.state.get_i64(LAST_UPDATE_CHECK_KEY) {
            Ok(v) => v,
            Err(e) => {
                warn!("cannot read last update check: {e}");
                None
            }
        }
    }

    /// Returns `true` if no check was recorded yet, or the last one is at
    /// least one check interval old.
    pub fn should_check(&self) -> bool {
        match self.last_check() {
            None => true,
            Some(last) => self.clock.now_millis().saturating_sub(last) >= self.interval_ms,
        }
    }

    /// Run one check cycle.
    ///
    /// Both release lookups run concurrently and fail independently. When
    /// `silent` is false, each available update is announced through the
    /// notifier.
    pub async fn check_for_updates(&self, silent: bool) -> UpdateCheckResult {
        let now = self.clock.now_millis();
        let checked_at = DateTime::<Utc>::from_timestamp_millis(now).unwrap_or_else(Utc::now);

        let extension_current = self
            .store
            .read_installed_version()
            .unwrap_or_else(|| self.extension_fallback.clone());

        let (extension_release, app_release) = tokio::join!(
            self.checker.latest_release(&self.extension_repo),
            self.checker.latest_release(&self.app_repo),
        );

        let result = UpdateCheckResult {
            extension: ArtifactStatus::resolve(Some(extension_current), extension_release),
            app: ArtifactStatus::resolve(Some(self.app_version.clone()), app_release),
            checked_at,
        };

        if let Err(e) = self.state.set_i64(LAST_UPDATE_CHECK_KEY, now) {
            warn!("cannot record update check: {e}");
        }

        debug!(
            extension_update = result.extension.update_available,
            app_update = result.app.update_available,
            "update check finished"
        );

        if !silent {
            if let Some(notice) = result.app.notice(ArtifactKind::App, &self.app_name) {
                deliver(self.notifier.as_ref(), &notice);
            }
            if let Some(notice) = result
                .extension
                .notice(ArtifactKind::Extension, &self.extension_name)
            {
                deliver(self.notifier.as_ref(), &notice);
            }
        }

        result
    }

    /// Run a cycle only if [`should_check`](Self::should_check) allows it.
    pub async fn check_if_due(&self, silent: bool) -> Option<UpdateCheckResult> {
        if !self.should_check() {
            debug!("update check skipped; last check is recent");
            return None;
        }
        Some(self.check_for_updates(silent).await)
    }

    /// Wake every `tick` and run a non-silent cycle whenever one is due,
    /// until `cancel` fires.
    pub async fn run(&self, tick: Duration, cancel: CancellationToken) {
        info!("update poller started");
        loop {
            self.check_if_due(false).await;
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(tick) => {}
            }
        }
        info!("update poller stopped");
    }
}
