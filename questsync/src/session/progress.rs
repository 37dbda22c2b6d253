//! Progress counters for a download session.
//!
//! The owning task is the only writer. Counters are atomics so other threads
//! can poll progress through a [`SessionHandle`] while `download()` runs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

const NO_LIMIT: usize = usize::MAX;

/// Shared counters of one session.
#[derive(Debug)]
pub(crate) struct ProgressCounters {
    total: AtomicUsize,
    completed: AtomicUsize,
    visible: AtomicUsize,
    max_quest_types: AtomicUsize,
    finished: AtomicBool,
    priority: AtomicBool,
}

impl Default for ProgressCounters {
    fn default() -> Self {
        Self {
            total: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            visible: AtomicUsize::new(0),
            max_quest_types: AtomicUsize::new(NO_LIMIT),
            finished: AtomicBool::new(false),
            priority: AtomicBool::new(false),
        }
    }
}

impl ProgressCounters {
    pub(crate) fn configure(&self, max_quest_types: Option<usize>, priority: bool) {
        self.max_quest_types
            .store(max_quest_types.unwrap_or(NO_LIMIT), Ordering::SeqCst);
        self.priority.store(priority, Ordering::SeqCst);
    }

    pub(crate) fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
    }

    pub(crate) fn mark_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn add_visible(&self, count: usize) {
        self.visible.fetch_add(count, Ordering::SeqCst);
    }

    pub(crate) fn mark_finished(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }

    pub(crate) fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub(crate) fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub(crate) fn visible(&self) -> usize {
        self.visible.load(Ordering::SeqCst)
    }

    pub(crate) fn max_quest_types(&self) -> Option<usize> {
        match self.max_quest_types.load(Ordering::SeqCst) {
            NO_LIMIT => None,
            max => Some(max),
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub(crate) fn is_priority(&self) -> bool {
        self.priority.load(Ordering::SeqCst)
    }

    /// Fraction of the effective total completed, in `0.0..=1.0`.
    ///
    /// The effective total is the quest type count capped by the limit.
    /// Returns 0.0 while it is zero (not started yet, or a limit of zero).
    pub(crate) fn progress(&self) -> f32 {
        let total = self.total();
        let effective = match self.max_quest_types() {
            Some(max) => max.min(total),
            None => total,
        };
        if effective == 0 {
            return 0.0;
        }
        (self.completed() as f32 / effective as f32).min(1.0)
    }
}

/// Cloneable read-only view of a session's progress.
///
/// The default handle belongs to no session and reports zero everywhere.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    counters: Arc<ProgressCounters>,
}

impl SessionHandle {
    pub(crate) fn new(counters: Arc<ProgressCounters>) -> Self {
        Self { counters }
    }

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

    pub fn downloaded_quest_types(&self) -> usize {
        self.counters.completed()
    }

    pub fn total_quest_types(&self) -> usize {
        self.counters.total()
    }
}
