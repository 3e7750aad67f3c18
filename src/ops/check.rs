use std::collections::HashSet;

use serde::Serialize;

use crate::model::ItemTree;

/// Structured result from `lat check`, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
}

/// An integrity violation in the in-memory tree.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    /// `parent_id` references an item that doesn't exist
    #[serde(rename = "dangling_parent")]
    DanglingParent { item_id: String, parent_id: String },
    /// A sibling scope's sort orders are not exactly 0..n-1
    #[serde(rename = "broken_scope_order")]
    BrokenScopeOrder {
        parent_id: Option<String>,
        completed: bool,
        sort_orders: Vec<usize>,
    },
    /// `completed_at` disagrees with `is_completed`
    #[serde(rename = "timestamp_mismatch")]
    TimestampMismatch { item_id: String },
    /// A completion snapshot no longer matches the child count
    #[serde(rename = "stale_snapshot")]
    StaleSnapshot {
        item_id: String,
        snapshot_len: usize,
        child_count: usize,
    },
}

/// Validate a tree and return structured results.
///
/// This is a read-only operation — it does not modify anything.
///
/// Checks performed:
/// 1. Every `parent_id` resolves to an existing item
/// 2. Every sibling scope (parent × completion partition) is numbered
///    exactly 0..n-1
/// 3. `completed_at` is present iff `is_completed`
/// 4. Any retained completion snapshot still matches the child count
///    (stale ones are tolerated at toggle time but reported here)
pub fn check_tree(tree: &ItemTree) -> CheckResult {
    let mut errors = Vec::new();

    for item in tree.iter() {
        if let Some(pid) = &item.parent_id
            && !tree.contains(pid)
        {
            errors.push(CheckError::DanglingParent {
                item_id: item.id.clone(),
                parent_id: pid.clone(),
            });
        }
        if item.is_completed != item.completed_at.is_some() {
            errors.push(CheckError::TimestampMismatch {
                item_id: item.id.clone(),
            });
        }
        if let Some(snap) = &item.previous_completion_state {
            let child_count = tree.children_canonical(&item.id).len();
            if snap.len() != child_count {
                errors.push(CheckError::StaleSnapshot {
                    item_id: item.id.clone(),
                    snapshot_len: snap.len(),
                    child_count,
                });
            }
        }
    }

    let mut scopes: HashSet<Option<String>> = HashSet::new();
    for item in tree.iter() {
        scopes.insert(item.parent_id.clone());
    }
    for scope in scopes {
        for completed in [false, true] {
            let orders: Vec<usize> = tree
                .siblings(scope.as_deref(), completed)
                .iter()
                .map(|i| i.sort_order)
                .collect();
            if orders.iter().enumerate().any(|(i, &o)| i != o) {
                errors.push(CheckError::BrokenScopeOrder {
                    parent_id: scope.clone(),
                    completed,
                    sort_orders: orders,
                });
            }
        }
    }

    CheckResult {
        valid: errors.is_empty(),
        errors,
    }
}
