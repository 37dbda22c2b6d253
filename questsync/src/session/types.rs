//! Quest (work) types and the registry that ranks them.

use std::collections::HashMap;
use std::fmt;

/// Name under which the notes type is recorded in the freshness index.
pub const NOTES_TYPE_NAME: &str = "OsmNoteQuest";

/// How a quest type is downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkTypeKind {
    /// User notes. Always fetched first, yields positions used to suppress
    /// duplicate quests nearby.
    Notes,
    /// Fetched per bounding box by the geographic provider.
    Geographic,
    /// Anything not downloaded by a session (e.g. created locally).
    Other,
}

/// A category of location-bound quest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkType {
    pub name: String,
    /// Higher is more important and downloaded earlier.
    pub importance: i32,
    pub kind: WorkTypeKind,
}

impl WorkType {
    pub fn geographic(name: impl Into<String>, importance: i32) -> Self {
        Self {
            name: name.into(),
            importance,
            kind: WorkTypeKind::Geographic,
        }
    }

    pub fn other(name: impl Into<String>, importance: i32) -> Self {
        Self {
            name: name.into(),
            importance,
            kind: WorkTypeKind::Other,
        }
    }

    /// The distinguished notes type.
    pub fn notes() -> Self {
        Self {
            name: NOTES_TYPE_NAME.to_string(),
            importance: i32::MAX,
            kind: WorkTypeKind::Notes,
        }
    }

    pub fn is_notes(&self) -> bool {
        self.kind == WorkTypeKind::Notes
    }
}

impl fmt::Display for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Source of the known quest types.
pub trait WorkTypeRegistry: Send + Sync {
    /// All quest types, most important first.
    fn sorted_by_importance(&self) -> Vec<WorkType>;

    /// Look up a quest type by its recorded name.
    fn by_name(&self, name: &str) -> Option<WorkType>;
}

/// Registry over a fixed list of quest types.
#[derive(Debug, Clone, Default)]
pub struct StaticWorkTypeRegistry {
    sorted: Vec<WorkType>,
    by_name: HashMap<String, usize>,
}

impl StaticWorkTypeRegistry {
    /// Build a registry. Types are ranked by descending importance; ties keep
    /// their input order.
    pub fn new(mut types: Vec<WorkType>) -> Self {
        types.sort_by(|a, b| b.importance.cmp(&a.importance));
        let by_name = types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();
        Self {
            sorted: types,
            by_name,
        }
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }
}

impl WorkTypeRegistry for StaticWorkTypeRegistry {
    fn sorted_by_importance(&self) -> Vec<WorkType> {
        self.sorted.clone()
    }

    fn by_name(&self, name: &str) -> Option<WorkType> {
        self.by_name.get(name).map(|&i| self.sorted[i].clone())
    }
}
