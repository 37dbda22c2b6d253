//! In-memory collaborators.
//!
//! Good enough to drive the trigger and sessions end to end without a
//! network or a database: the replay command and the integration tests run
//! against these.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::coord::{BoundingBox, Position, TileCoord, TileRect};
use crate::session::{
    FreshnessIndex, GeographicProvider, NoteProvider, ProviderError, VisibleQuestListener,
    WorkType, NOTES_TYPE_NAME,
};
use crate::trigger::{ConnectivityMonitor, ConnectivitySnapshot, PositionTracker, TrackerError};

/// Download history per tile and quest type, plus locally known notes.
#[derive(Debug, Default)]
pub struct MemoryFreshnessIndex {
    downloads: RwLock<HashMap<(TileCoord, String), DateTime<Utc>>>,
    notes: RwLock<Vec<Position>>,
}

impl MemoryFreshnessIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `name` was downloaded for every tile in `tiles` at `at`.
    pub fn record(&self, tiles: &TileRect, name: &str, at: DateTime<Utc>) {
        let mut downloads = self.downloads.write();
        for tile in tiles.tiles() {
            downloads.insert((tile, name.to_string()), at);
        }
    }

    pub fn add_notes(&self, positions: &[Position]) {
        self.notes.write().extend_from_slice(positions);
    }

    /// Number of (tile, quest type) entries recorded.
    pub fn len(&self) -> usize {
        self.downloads.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.downloads.read().is_empty()
    }

    pub fn clear(&self) {
        self.downloads.write().clear();
        self.notes.write().clear();
    }
}

impl FreshnessIndex for MemoryFreshnessIndex {
    /// A name counts only if every tile of `tiles` was downloaded since `since`.
    fn names_downloaded_since(
        &self,
        tiles: &TileRect,
        since: DateTime<Utc>,
    ) -> Result<HashSet<String>, ProviderError> {
        let downloads = self.downloads.read();
        let mut per_name: HashMap<&str, u64> = HashMap::new();

        for ((tile, name), at) in downloads.iter() {
            if *at >= since && tiles.contains(tile) {
                *per_name.entry(name.as_str()).or_default() += 1;
            }
        }

        let needed = tiles.tile_count();
        Ok(per_name
            .into_iter()
            .filter(|(_, count)| *count == needed)
            .map(|(name, _)| name.to_string())
            .collect())
    }

    fn positions_of_known_notes(&self, bbox: &BoundingBox) -> Result<Vec<Position>, ProviderError> {
        Ok(self
            .notes
            .read()
            .iter()
            .filter(|p| bbox.contains(p))
            .copied()
            .collect())
    }
}

/// Serves notes from a fixed list and records what it handed out.
pub struct MemoryNoteProvider {
    index: Arc<MemoryFreshnessIndex>,
    notes: Vec<Position>,
}

impl MemoryNoteProvider {
    pub fn new(index: Arc<MemoryFreshnessIndex>, notes: Vec<Position>) -> Self {
        Self { index, notes }
    }
}

impl NoteProvider for MemoryNoteProvider {
    fn download(
        &self,
        tiles: &TileRect,
        _user_id: Option<u64>,
        max_notes: usize,
        listener: Option<&dyn VisibleQuestListener>,
    ) -> Result<Vec<Position>, ProviderError> {
        let bbox = tiles.to_bounding_box();
        let found: Vec<Position> = self
            .notes
            .iter()
            .filter(|p| bbox.contains(p))
            .take(max_notes)
            .copied()
            .collect();

        self.index.add_notes(&found);
        self.index.record(tiles, NOTES_TYPE_NAME, Utc::now());
        if let (Some(listener), false) = (listener, found.is_empty()) {
            listener.on_quests_visible(&WorkType::notes(), &found);
        }

        debug!(bbox = %bbox, notes = found.len(), "Served notes from memory");
        Ok(found)
    }
}

/// Serves quests from a fixed per-type list of positions.
///
/// Quests sitting exactly on an excluded position are dropped.
pub struct MemoryQuestProvider {
    index: Arc<MemoryFreshnessIndex>,
    quests: HashMap<String, Vec<Position>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryQuestProvider {
    pub fn new(index: Arc<MemoryFreshnessIndex>, quests: HashMap<String, Vec<Position>>) -> Self {
        Self {
            index,
            quests,
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Make downloads of `name` fail with a network error.
    pub fn fail_quest_type(&self, name: impl Into<String>) {
        self.failing.lock().insert(name.into());
    }
}

impl GeographicProvider for MemoryQuestProvider {
    fn download(
        &self,
        quest_type: &WorkType,
        tiles: &TileRect,
        exclude_positions: &[Position],
        listener: Option<&dyn VisibleQuestListener>,
    ) -> Result<usize, ProviderError> {
        if self.failing.lock().contains(&quest_type.name) {
            return Err(ProviderError::Network(format!(
                "{} unavailable",
                quest_type.name
            )));
        }

        let bbox = tiles.to_bounding_box();
        let visible: Vec<Position> = self
            .quests
            .get(&quest_type.name)
            .into_iter()
            .flatten()
            .filter(|p| bbox.contains(p) && !exclude_positions.contains(p))
            .copied()
            .collect();

        self.index.record(tiles, &quest_type.name, Utc::now());
        if let (Some(listener), false) = (listener, visible.is_empty()) {
            listener.on_quests_visible(quest_type, &visible);
        }

        Ok(visible.len())
    }
}

/// Connectivity that changes only when told to.
#[derive(Debug)]
pub struct MemoryConnectivity {
    snapshot: Mutex<ConnectivitySnapshot>,
}

impl MemoryConnectivity {
    pub fn new(snapshot: ConnectivitySnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }

    pub fn set(&self, snapshot: ConnectivitySnapshot) {
        *self.snapshot.lock() = snapshot;
    }
}

impl ConnectivityMonitor for MemoryConnectivity {
    fn current(&self) -> ConnectivitySnapshot {
        *self.snapshot.lock()
    }
}

/// Position tracker that only remembers whether it runs.
#[derive(Debug, Default)]
pub struct MemoryPositionTracker {
    running: AtomicBool,
}

impl MemoryPositionTracker {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl PositionTracker for MemoryPositionTracker {
    fn start(&self) {
        self.running.store(true, Ordering::Release);
    }

    /// Stopping a tracker that is not running is an error.
    fn stop(&self) -> Result<(), TrackerError> {
        if self.running.swap(false, Ordering::AcqRel) {
            Ok(())
        } else {
            Err(TrackerError::NotRunning)
        }
    }
}
