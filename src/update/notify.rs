//! Update notifications.
//!
//! The host's notification subsystem implements [`Notifier`]. When it reports
//! itself unsupported the notice is only logged.

use serde::Serialize;
use tracing::info;

/// Which artifact an update refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// The host application.
    App,
    /// The managed browser extension.
    Extension,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::App => write!(f, "App"),
            Self::Extension => write!(f, "Extension"),
        }
    }
}

/// A newer version is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateNotice {
    /// Artifact that has an update.
    pub kind: ArtifactKind,
    /// Configured display name of the artifact.
    pub name: String,
    /// Installed version.
    pub current: String,
    /// Latest published version.
    pub latest: String,
    /// Release page opened when the notification is clicked.
    pub url: Option<String>,
}

impl UpdateNotice {
    /// Notification title.
    pub fn title(&self) -> String {
        format!("{} Update Available", self.kind)
    }

    /// Notification body.
    pub fn body(&self) -> String {
        format!(
            "{} has been updated to version {} (current: {})",
            self.kind, self.latest, self.current
        )
    }
}

/// User-visible notification sink.
pub trait Notifier: Send + Sync {
    /// Whether notifications can be shown on this system.
    fn is_supported(&self) -> bool {
        true
    }

    /// Show `notice`; clicking it should open [`UpdateNotice::url`].
    fn notify(&self, notice: &UpdateNotice);
}

/// Notifier that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &UpdateNotice) {
        info!(
            name = %notice.name,
            url = notice.url.as_deref().unwrap_or("-"),
            "{}: {}",
            notice.title(),
            notice.body()
        );
    }
}

/// Deliver `notice` through `notifier`, falling back to a log line when the
/// notifier is unsupported.
pub fn deliver(notifier: &dyn Notifier, notice: &UpdateNotice) {
    if !notifier.is_supported() {
        info!(
            "Update available: {} ({}) {} -> {}",
            notice.kind, notice.name, notice.current, notice.latest
        );
        return;
    }
    notifier.notify(notice);
}
