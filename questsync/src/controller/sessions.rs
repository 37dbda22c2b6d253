//! In-process [`SyncController`] backed by [`DownloadSession`]s.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{ControllerError, SyncController};
use crate::coord::TileRect;
use crate::session::{
    DownloadSession, SessionConfig, SessionDeps, SessionHandle, SessionListener,
    VisibleQuestListener,
};

/// Action run by [`SyncController::upload`].
pub type UploadAction = Arc<dyn Fn() + Send + Sync>;

/// Releases the priority slot when dropped.
struct PrioritySlot<'a>(&'a AtomicBool);

impl Drop for PrioritySlot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Builds and runs download sessions.
///
/// Every session gets a child of the controller's cancellation token, so
/// [`shutdown`](Self::shutdown) cancels all of them between quest types.
pub struct SessionController {
    deps: SessionDeps,
    config: SessionConfig,
    upload_action: UploadAction,
    quest_listener: Option<Arc<dyn VisibleQuestListener>>,
    progress_listener: Option<Arc<dyn SessionListener>>,
    priority_running: AtomicBool,
    running: AtomicUsize,
    started: AtomicUsize,
    cancel: CancellationToken,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("config", &self.config)
            .field("priority_running", &self.is_priority_download_running())
            .field("running", &self.running_downloads())
            .finish_non_exhaustive()
    }
}

impl SessionController {
    pub fn new(deps: SessionDeps, config: SessionConfig, upload_action: UploadAction) -> Self {
        Self {
            deps,
            config,
            upload_action,
            quest_listener: None,
            progress_listener: None,
            priority_running: AtomicBool::new(false),
            running: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a visibility listener to every session built from now on.
    pub fn with_quest_listener(mut self, listener: Arc<dyn VisibleQuestListener>) -> Self {
        self.quest_listener = Some(listener);
        self
    }

    /// Attach a progress listener to every session built from now on.
    pub fn with_progress_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.progress_listener = Some(listener);
        self
    }

    /// Sessions currently inside `download()`.
    pub fn running_downloads(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    /// Sessions built since the controller was created.
    pub fn sessions_started(&self) -> usize {
        self.started.load(Ordering::Acquire)
    }

    /// Cancel all running sessions and refuse new ones.
    pub fn shutdown(&self) {
        info!(running = self.running_downloads(), "Shutting down session controller");
        self.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn claim_priority_slot(&self) -> Result<PrioritySlot<'_>, ControllerError> {
        self.priority_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| PrioritySlot(&self.priority_running))
            .map_err(|_| ControllerError::PriorityDownloadRunning)
    }

    fn build_session(&self) -> DownloadSession {
        let mut session = DownloadSession::new(self.deps.clone(), self.config.clone());
        if let Some(listener) = &self.quest_listener {
            session.set_quest_listener(Arc::clone(listener));
        }
        if let Some(listener) = &self.progress_listener {
            session.set_progress_listener(Arc::clone(listener));
        }
        session
    }
}

impl SyncController for SessionController {
    fn download(
        &self,
        tiles: TileRect,
        max_quest_types: Option<usize>,
        is_priority: bool,
    ) -> Result<SessionHandle, ControllerError> {
        if self.is_shut_down() {
            return Err(ControllerError::ShutDown);
        }

        let _slot = if is_priority {
            Some(self.claim_priority_slot()?)
        } else {
            None
        };

        let mut session = self.build_session();
        session.init(tiles, max_quest_types, is_priority, self.cancel.child_token())?;
        let handle = session.handle();

        self.started.fetch_add(1, Ordering::AcqRel);
        self.running.fetch_add(1, Ordering::AcqRel);
        let _running = RunningGuard(&self.running);

        debug!(tiles = %tiles, ?max_quest_types, is_priority, "Running download session");
        session.download()?;

        Ok(handle)
    }

    fn upload(&self) {
        debug!("Starting upload");
        (self.upload_action)();
    }

    fn is_priority_download_running(&self) -> bool {
        self.priority_running.load(Ordering::Acquire)
    }
}
