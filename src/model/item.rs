use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a top-level item represents. Children are always plain task rows,
/// so `kind` only carries meaning when `parent_id` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Task,
    Project,
    List,
}

impl Default for ItemKind {
    fn default() -> Self {
        ItemKind::Task
    }
}

/// Priority level used by the priority sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// The single entity type behind tasks, subtasks, list items, and
/// project tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Opaque unique id, stable for the item's lifetime
    pub id: String,
    /// `None` for top-level items
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub kind: ItemKind,
    /// Display title; non-empty after trim (enforced at create/edit boundaries)
    pub title: String,
    #[serde(default)]
    pub is_completed: bool,
    /// Set exactly when `is_completed` goes false→true, cleared on true→false
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Contiguous 0-based position within the item's sibling scope
    /// (same parent, same completion partition)
    #[serde(default)]
    pub sort_order: usize,
    /// Per-child completion snapshot captured when a parent is completed
    /// directly; indices follow child creation order
    #[serde(default)]
    pub previous_completion_state: Option<Vec<bool>>,
    #[serde(default)]
    pub category_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Whether an external commitment references this item
    #[serde(default)]
    pub is_committed: bool,
}

impl Item {
    /// Create a new incomplete item at the front of its scope
    pub fn new(id: String, parent_id: Option<String>, kind: ItemKind, title: String) -> Self {
        Item {
            id,
            parent_id,
            kind,
            title,
            is_completed: false,
            completed_at: None,
            sort_order: 0,
            previous_completion_state: None,
            category_id: None,
            created_at: Utc::now(),
            priority: None,
            is_committed: false,
        }
    }

    /// Mark complete, stamping `completed_at`. No-op if already complete,
    /// so an earlier timestamp is never overwritten.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        if !self.is_completed {
            self.is_completed = true;
            self.completed_at = Some(now);
        }
    }

    /// Mark incomplete, clearing `completed_at`
    pub fn mark_uncompleted(&mut self) {
        self.is_completed = false;
        self.completed_at = None;
    }
}
