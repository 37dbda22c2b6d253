//! Collaborator interfaces a download session depends on.
//!
//! Everything behind these traits is I/O owned by the surrounding app:
//! network fetches, the downloaded-tiles bookkeeping, UI listeners.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::error::ProviderError;
use super::types::WorkType;
use crate::coord::{BoundingBox, Position, TileRect};

/// Bookkeeping of which quest types were downloaded where, and when.
pub trait FreshnessIndex: Send + Sync {
    /// Names of quest types downloaded for `tiles` at or after `since`.
    fn names_downloaded_since(
        &self,
        tiles: &TileRect,
        since: DateTime<Utc>,
    ) -> Result<HashSet<String>, ProviderError>;

    /// Positions of notes already stored locally inside `bbox`.
    fn positions_of_known_notes(&self, bbox: &BoundingBox) -> Result<Vec<Position>, ProviderError>;
}

/// Downloads user notes.
pub trait NoteProvider: Send + Sync {
    /// Download up to `max_notes` notes in `tiles`, optionally only those
    /// relevant to `user_id`. Returns the positions notes were found at.
    fn download(
        &self,
        tiles: &TileRect,
        user_id: Option<u64>,
        max_notes: usize,
        listener: Option<&dyn VisibleQuestListener>,
    ) -> Result<Vec<Position>, ProviderError>;
}

/// Downloads quests of one geographic quest type per call.
pub trait GeographicProvider: Send + Sync {
    /// Download `quest_type` quests in `tiles`, skipping any at
    /// `exclude_positions`. Returns the number of newly visible quests.
    fn download(
        &self,
        quest_type: &WorkType,
        tiles: &TileRect,
        exclude_positions: &[Position],
        listener: Option<&dyn VisibleQuestListener>,
    ) -> Result<usize, ProviderError>;
}

/// Receives session lifecycle notifications.
///
/// All methods default to no-ops.
pub trait SessionListener: Send + Sync {
    fn on_started(&self) {}

    /// Nothing needed fetching; the session finished without starting.
    fn on_not_started(&self) {}

    fn on_progress(&self, _progress: f32) {}

    fn on_finished(&self) {}
}

/// Receives per-quest visibility changes from providers.
pub trait VisibleQuestListener: Send + Sync {
    fn on_quests_visible(&self, quest_type: &WorkType, positions: &[Position]);

    fn on_quests_hidden(&self, _quest_type: &WorkType, _positions: &[Position]) {}
}

/// Listener that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl SessionListener for NoopListener {}
