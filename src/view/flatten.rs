use std::collections::HashSet;

use crate::model::ItemTree;

use super::filter::{ViewOptions, filter_and_sort};

/// One row of the flat display projection. A UI renders the whole
/// sequence as a single reorderable list while the tree grouping is
/// preserved by row order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayRow {
    Parent { id: String },
    Child { id: String, parent_id: String },
    /// The add-item affordance at the end of an expanded child section
    AddChild { parent_id: String },
    /// Collapsed marker standing in for a parent's completed children
    DoneMarker { parent_id: String, done_count: usize },
}

/// A flat-list move translated back to its sibling scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedMove {
    pub parent_id: Option<String>,
    pub dropped_id: String,
    pub target_id: String,
}

/// Project the tree into a flat ordered row sequence: filtered/sorted
/// uncompleted parents, and for each expanded parent its uncompleted
/// children in child order, the add-child affordance, then a done-section
/// marker when completed children exist.
///
/// Pure projection — no side effects, cheap enough to recompute on every
/// state change at the expected list sizes.
pub fn flatten(
    tree: &ItemTree,
    expanded: &HashSet<String>,
    opts: &ViewOptions,
) -> Vec<DisplayRow> {
    let mut rows = Vec::new();
    for parent in filter_and_sort(tree.roots(false), opts) {
        rows.push(DisplayRow::Parent {
            id: parent.id.clone(),
        });
        if !expanded.contains(&parent.id) {
            continue;
        }
        for child in tree.siblings(Some(&parent.id), false) {
            rows.push(DisplayRow::Child {
                id: child.id.clone(),
                parent_id: parent.id.clone(),
            });
        }
        rows.push(DisplayRow::AddChild {
            parent_id: parent.id.clone(),
        });
        let done_count = tree.partition_len(Some(&parent.id), true);
        if done_count > 0 {
            rows.push(DisplayRow::DoneMarker {
                parent_id: parent.id.clone(),
                done_count,
            });
        }
    }
    rows
}

/// Map a drag on the flat sequence back to a sibling-scope reorder.
///
/// Moves are rejected (`None`) when the view is not in ascending manual
/// order, when either index is out of range or lands on a synthetic row,
/// or when the move would cross a scope boundary (child dragged outside
/// its parent's section, parent dropped onto a child).
pub fn translate_move(
    rows: &[DisplayRow],
    from: usize,
    to: usize,
    opts: &ViewOptions,
) -> Option<ScopedMove> {
    if !opts.is_manual() {
        return None;
    }
    match (rows.get(from)?, rows.get(to)?) {
        (DisplayRow::Parent { id: dropped }, DisplayRow::Parent { id: target }) => {
            Some(ScopedMove {
                parent_id: None,
                dropped_id: dropped.clone(),
                target_id: target.clone(),
            })
        }
        (
            DisplayRow::Child {
                id: dropped,
                parent_id: from_parent,
            },
            DisplayRow::Child {
                id: target,
                parent_id: to_parent,
            },
        ) if from_parent == to_parent => Some(ScopedMove {
            parent_id: Some(from_parent.clone()),
            dropped_id: dropped.clone(),
            target_id: target.clone(),
        }),
        _ => None,
    }
}
