//! Session ownership and the upload action.
//!
//! The [`SyncController`] trait is what the auto-sync trigger talks to.
//! [`SessionController`] is the in-process implementation: it builds a
//! [`DownloadSession`](crate::session::DownloadSession) per request, runs it
//! on the calling thread, and makes sure at most one priority session is in
//! flight at any time.

mod error;
mod sessions;

pub use error::ControllerError;
pub use sessions::{SessionController, UploadAction};

use crate::coord::TileRect;
use crate::session::SessionHandle;

/// Download and upload entry points used by the auto-sync trigger.
pub trait SyncController: Send + Sync {
    /// Run a download session for `tiles` to completion.
    ///
    /// Returns a read-only view of the finished session.
    fn download(
        &self,
        tiles: TileRect,
        max_quest_types: Option<usize>,
        is_priority: bool,
    ) -> Result<SessionHandle, ControllerError>;

    /// Upload pending changes. Fire and forget.
    fn upload(&self);

    /// Whether a priority session is currently running.
    fn is_priority_download_running(&self) -> bool;
}
