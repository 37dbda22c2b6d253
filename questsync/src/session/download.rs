//! The download session: one sequential, cancellable pass over all quest
//! types for a tile region.
//!
//! # Lifecycle
//!
//! ```text
//! Created --init()--> Configured --download()--> Running --> Finished
//! ```
//!
//! `download()` runs to completion on the calling thread. Quest types are
//! processed strictly one after another: notes first, then by descending
//! importance. Cancellation is checked only between quest types.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::error::{SessionError, SessionResult};
use super::progress::{ProgressCounters, SessionHandle};
use super::traits::{
    FreshnessIndex, GeographicProvider, NoopListener, NoteProvider, SessionListener,
    VisibleQuestListener,
};
use super::types::{WorkType, WorkTypeKind, WorkTypeRegistry, NOTES_TYPE_NAME};
use crate::coord::{BoundingBox, Position, TileRect};

/// Default cap on notes fetched per session.
pub const DEFAULT_MAX_NOTES: usize = 10_000;

/// Collaborators a session is built from.
#[derive(Clone)]
pub struct SessionDeps {
    pub registry: Arc<dyn WorkTypeRegistry>,
    pub freshness: Arc<dyn FreshnessIndex>,
    pub notes: Arc<dyn NoteProvider>,
    pub quests: Arc<dyn GeographicProvider>,
}

/// Static session settings, normally taken from [`SyncConfig`](crate::config::SyncConfig).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long a recorded download stays fresh. Zero means never fresh.
    pub quest_expiration: Duration,
    /// Restrict note downloads to this user, if set.
    pub user_id: Option<u64>,
    pub max_notes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            quest_expiration: Duration::ZERO,
            user_id: None,
            max_notes: DEFAULT_MAX_NOTES,
        }
    }
}

/// Earliest download timestamp still considered fresh.
///
/// `now - expiration`, clamped to the unix epoch.
pub fn freshness_cutoff(now: DateTime<Utc>, expiration: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(expiration)
        .ok()
        .and_then(|expiration| now.checked_sub_signed(expiration))
        .map_or(DateTime::<Utc>::UNIX_EPOCH, |cutoff| {
            cutoff.max(DateTime::<Utc>::UNIX_EPOCH)
        })
}

#[derive(Debug, Clone)]
struct SessionSetup {
    tiles: TileRect,
    max_quest_types: Option<usize>,
    cancel: CancellationToken,
}

/// Marks the session finished and notifies the listener when dropped.
struct FinishGuard<'a> {
    counters: &'a ProgressCounters,
    listener: &'a dyn SessionListener,
    bbox: BoundingBox,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.counters.mark_finished();
        self.listener.on_finished();
        info!(bbox = %self.bbox, "Quest download finished");
    }
}

/// One download pass over a tile region.
pub struct DownloadSession {
    deps: SessionDeps,
    config: SessionConfig,
    quest_listener: Option<Arc<dyn VisibleQuestListener>>,
    progress_listener: Arc<dyn SessionListener>,
    setup: Option<SessionSetup>,
    started: bool,
    counters: Arc<ProgressCounters>,
}

impl std::fmt::Debug for DownloadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadSession")
            .field("config", &self.config)
            .field("setup", &self.setup)
            .field("started", &self.started)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl DownloadSession {
    pub fn new(deps: SessionDeps, config: SessionConfig) -> Self {
        Self {
            deps,
            config,
            quest_listener: None,
            progress_listener: Arc::new(NoopListener),
            setup: None,
            started: false,
            counters: Arc::new(ProgressCounters::default()),
        }
    }

    pub fn set_quest_listener(&mut self, listener: Arc<dyn VisibleQuestListener>) {
        self.quest_listener = Some(listener);
    }

    pub fn set_progress_listener(&mut self, listener: Arc<dyn SessionListener>) {
        self.progress_listener = listener;
    }

    /// Configure the session. Must be called exactly once, before `download()`.
    pub fn init(
        &mut self,
        tiles: TileRect,
        max_quest_types: Option<usize>,
        is_priority: bool,
        cancel: CancellationToken,
    ) -> SessionResult<()> {
        if self.setup.is_some() {
            return Err(SessionError::AlreadyConfigured);
        }
        self.counters.configure(max_quest_types, is_priority);
        self.setup = Some(SessionSetup {
            tiles,
            max_quest_types,
            cancel,
        });
        Ok(())
    }

    /// Run the download pass. Must be called exactly once, after `init()`.
    ///
    /// Provider failures propagate; the session is still marked finished and
    /// the listener still gets `on_finished` once the pass had started.
    pub fn download(&mut self) -> SessionResult<()> {
        let setup = self.setup.clone().ok_or(SessionError::NotConfigured)?;
        if self.started {
            return Err(SessionError::AlreadyStarted);
        }
        self.started = true;

        // Cancelled before anything happened: no notification at all.
        if setup.cancel.is_cancelled() {
            debug!(tiles = %setup.tiles, "Quest download cancelled before start");
            return Ok(());
        }

        let quest_types = self.quest_types_to_download(&setup.tiles)?;
        let listener = Arc::clone(&self.progress_listener);

        if quest_types.is_empty() {
            self.counters.mark_finished();
            listener.on_not_started();
            return Ok(());
        }

        self.counters.set_total(quest_types.len());
        let bbox = setup.tiles.to_bounding_box();

        info!(
            bbox = %bbox,
            quest_types = quest_types.len(),
            priority = self.counters.is_priority(),
            "Starting quest download"
        );
        listener.on_started();

        let _guard = FinishGuard {
            counters: &self.counters,
            listener: listener.as_ref(),
            bbox,
        };

        let note_positions = if quest_types.iter().any(WorkType::is_notes) {
            self.download_notes(&setup.tiles)?
        } else {
            self.note_positions_from_db(&bbox)?
        };

        self.download_quest_types(&quest_types, &setup, &note_positions)?;
        Ok(())
    }

    /// Current progress in `0.0..=1.0`; 0.0 until the quest type count is known.
    pub fn progress(&self) -> f32 {
        self.counters.progress()
    }

    pub fn is_finished(&self) -> bool {
        self.counters.is_finished()
    }

    pub fn is_priority(&self) -> bool {
        self.counters.is_priority()
    }

    pub fn visible_quests(&self) -> usize {
        self.counters.visible()
    }

    pub fn total_quest_types(&self) -> usize {
        self.counters.total()
    }

    pub fn downloaded_quest_types(&self) -> usize {
        self.counters.completed()
    }

    /// Read-only progress view that outlives borrows of the session.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(Arc::clone(&self.counters))
    }

    fn quest_types_to_download(&self, tiles: &TileRect) -> SessionResult<Vec<WorkType>> {
        let mut result = vec![WorkType::notes()];
        result.extend(
            self.deps
                .registry
                .sorted_by_importance()
                .into_iter()
                .filter(|t| !t.is_notes()),
        );

        let cutoff = freshness_cutoff(Utc::now(), self.config.quest_expiration);
        let already_downloaded = self
            .deps
            .freshness
            .names_downloaded_since(tiles, cutoff)
            .map_err(SessionError::Freshness)?;

        if already_downloaded.is_empty() {
            return Ok(result);
        }

        let mut skip: HashSet<WorkType> = HashSet::with_capacity(already_downloaded.len());
        for name in &already_downloaded {
            if name == NOTES_TYPE_NAME {
                skip.insert(WorkType::notes());
            } else if let Some(quest_type) = self.deps.registry.by_name(name) {
                skip.insert(quest_type);
            } else {
                debug!(name = %name, "Ignoring unknown quest type in download history");
            }
        }
        result.retain(|t| !skip.contains(t));

        let mut names: Vec<_> = already_downloaded.into_iter().collect();
        names.sort();
        info!(
            quest_types = ?names,
            "Not downloading quest types because they are in local storage already"
        );

        Ok(result)
    }

    fn note_positions_from_db(&self, bbox: &BoundingBox) -> SessionResult<Vec<Position>> {
        self.deps
            .freshness
            .positions_of_known_notes(bbox)
            .map_err(SessionError::Freshness)
    }

    fn download_notes(&self, tiles: &TileRect) -> SessionResult<Vec<Position>> {
        let positions = self
            .deps
            .notes
            .download(
                tiles,
                self.config.user_id,
                self.config.max_notes,
                self.quest_listener.as_deref(),
            )
            .map_err(|source| SessionError::Provider {
                quest_type: NOTES_TYPE_NAME.to_string(),
                source,
            })?;

        debug!(notes = positions.len(), "Downloaded notes");
        self.counters.mark_completed();
        self.dispatch_progress();
        Ok(positions)
    }

    fn download_quest_types(
        &self,
        quest_types: &[WorkType],
        setup: &SessionSetup,
        note_positions: &[Position],
    ) -> SessionResult<usize> {
        let mut visible_quests = 0;

        for quest_type in quest_types {
            if quest_type.kind != WorkTypeKind::Geographic {
                continue;
            }
            if setup.cancel.is_cancelled() {
                debug!(next = %quest_type, "Quest download cancelled");
                break;
            }
            if let Some(max) = setup.max_quest_types {
                if self.counters.completed() >= max {
                    debug!(max, "Quest type limit reached");
                    break;
                }
            }

            let count = self
                .deps
                .quests
                .download(
                    quest_type,
                    &setup.tiles,
                    note_positions,
                    self.quest_listener.as_deref(),
                )
                .map_err(|source| SessionError::Provider {
                    quest_type: quest_type.name.clone(),
                    source,
                })?;

            debug!(quest_type = %quest_type, visible = count, "Downloaded quest type");
            visible_quests += count;
            self.counters.add_visible(count);
            self.counters.mark_completed();
            self.dispatch_progress();
        }

        Ok(visible_quests)
    }

    fn dispatch_progress(&self) {
        self.progress_listener.on_progress(self.counters.progress());
    }
}
