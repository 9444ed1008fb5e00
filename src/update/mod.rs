//! Update checks for the extension and the host application.
//!
//! Checks GitHub releases for newer versions, throttles checks through a
//! persisted timestamp, and notifies the user when something newer exists.

pub mod checker;
pub mod notify;
pub mod poller;
pub mod state;

pub use checker::{ReleaseInfo, UpdateChecker};
pub use notify::{ArtifactKind, LogNotifier, Notifier, UpdateNotice};
pub use poller::{ArtifactStatus, Clock, SystemClock, UpdateCheckResult, UpdatePoller};
pub use state::{JsonStateStore, LAST_UPDATE_CHECK_KEY, MemoryStateStore, StateStore};
