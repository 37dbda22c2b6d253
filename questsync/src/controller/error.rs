use thiserror::Error;

use crate::session::SessionError;

/// Errors from [`SyncController::download`](super::SyncController::download).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// Another priority session holds the slot.
    #[error("a priority download is already running")]
    PriorityDownloadRunning,

    /// The controller was shut down.
    #[error("controller is shut down")]
    ShutDown,

    #[error(transparent)]
    Session(#[from] SessionError),
}
