use chrono::{DateTime, Utc};

use crate::model::{ItemTree, SortUpdate};
use crate::store::PersistAction;

/// An item whose completion flag flipped, for cross-view broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionChange {
    pub id: String,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Everything a single toggle did: the persistence actions to replay
/// against the store, and the flag flips other screens need to hear about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeOutcome {
    pub effects: Vec<PersistAction>,
    pub changes: Vec<CompletionChange>,
}

/// Toggle completion on `id`, resolving the full parent⇄child cascade.
///
/// Rules, in precedence order:
/// 1. Direct completion of a parent snapshots its children's states, then
///    completes the parent and every child.
/// 2. Direct un-completion of a parent restores children from the snapshot
///    when it is present and matches the current child count; otherwise
///    children are left as they are.
/// 3. A child toggle flips only that child, then auto-completes the parent
///    when every child is complete, or auto-uncompletes it when one isn't —
///    auto transitions never write, clear, or apply snapshots, and
///    auto-uncompletion leaves the other children untouched.
/// 4. A leaf toggle is a plain flip.
///
/// All in-memory mutation happens before this function returns; the
/// returned effects are for background persistence only.
///
/// Returns `None` when `id` is not in the tree.
pub fn toggle(tree: &mut ItemTree, id: &str, now: DateTime<Utc>) -> Option<CascadeOutcome> {
    let item = tree.get(id)?;
    let parent_id = item.parent_id.clone();
    let was_completed = item.is_completed;

    let mut out = CascadeOutcome::default();
    let mut touched = TouchedScopes::default();

    if tree.has_children(id) {
        if was_completed {
            uncomplete_parent_direct(tree, id, now, &mut out, &mut touched);
        } else {
            complete_parent_direct(tree, id, now, &mut out, &mut touched);
        }
    } else {
        flip_completion(tree, id, !was_completed, now, &mut out, &mut touched);
        out.effects.push(PersistAction::SetCompleted {
            id: id.to_string(),
            completed: !was_completed,
        });
    }

    if let Some(pid) = parent_id {
        propagate_to_parent(tree, &pid, now, &mut out, &mut touched);
    }

    let renumbered = touched.normalize(tree);
    if !renumbered.is_empty() {
        out.effects.push(PersistAction::SortOrders(renumbered));
    }

    tracing::debug!(item = id, changes = out.changes.len(), "completion cascade resolved");
    Some(out)
}

// ---------------------------------------------------------------------------
// Rule 1 — direct completion of a parent
// ---------------------------------------------------------------------------

fn complete_parent_direct(
    tree: &mut ItemTree,
    id: &str,
    now: DateTime<Utc>,
    out: &mut CascadeOutcome,
    touched: &mut TouchedScopes,
) {
    // Snapshot child states before any of them change, in canonical order
    let snapshot: Vec<bool> = tree
        .children_canonical(id)
        .iter()
        .map(|c| c.is_completed)
        .collect();
    let child_ids = tree.child_ids_canonical(id);

    flip_completion(tree, id, true, now, out, touched);
    let parent = tree
        .get_mut(id)
        .expect("toggled parent still in tree");
    parent.previous_completion_state = Some(snapshot);
    out.effects.push(PersistAction::Save(parent.clone()));

    for child_id in child_ids {
        if flip_completion(tree, &child_id, true, now, out, touched) {
            out.effects.push(PersistAction::SetCompleted {
                id: child_id,
                completed: true,
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Rule 2 — direct un-completion of a parent
// ---------------------------------------------------------------------------

fn uncomplete_parent_direct(
    tree: &mut ItemTree,
    id: &str,
    now: DateTime<Utc>,
    out: &mut CascadeOutcome,
    touched: &mut TouchedScopes,
) {
    flip_completion(tree, id, false, now, out, touched);
    let parent = tree
        .get_mut(id)
        .expect("toggled parent still in tree");
    // The snapshot is single-use: consumed by this restore, or discarded
    // as stale
    let snapshot = parent.previous_completion_state.take();
    out.effects.push(PersistAction::Save(parent.clone()));

    let child_ids = tree.child_ids_canonical(id);
    if let Some(states) = snapshot
        && states.len() == child_ids.len()
    {
        for (child_id, &state) in child_ids.iter().zip(states.iter()) {
            flip_completion(tree, child_id, state, now, out, touched);
        }
        out.effects.push(PersistAction::RestoreChildren {
            parent_id: id.to_string(),
            states,
        });
    }
    // Stale or missing snapshot: children keep their current states
}

// ---------------------------------------------------------------------------
// Rule 3 — child-driven auto transitions
// ---------------------------------------------------------------------------

fn propagate_to_parent(
    tree: &mut ItemTree,
    parent_id: &str,
    now: DateTime<Utc>,
    out: &mut CascadeOutcome,
    touched: &mut TouchedScopes,
) {
    let children = tree.children_canonical(parent_id);
    if children.is_empty() {
        return;
    }
    let all_complete = children.iter().all(|c| c.is_completed);
    let Some(parent) = tree.get(parent_id) else {
        return;
    };
    let parent_completed = parent.is_completed;
    let grandparent = parent.parent_id.clone();

    let flipped = if all_complete && !parent_completed {
        // Nothing to restore later — children are already all complete,
        // so no snapshot is taken
        flip_completion(tree, parent_id, true, now, out, touched)
    } else if !all_complete && parent_completed {
        // Intentional asymmetry with rule 2: the other children keep
        // whatever state they currently have
        flip_completion(tree, parent_id, false, now, out, touched)
    } else {
        false
    };

    if flipped {
        out.effects.push(PersistAction::SetCompleted {
            id: parent_id.to_string(),
            completed: all_complete,
        });
        if let Some(gp) = grandparent {
            propagate_to_parent(tree, &gp, now, out, touched);
        }
    }
}

// ---------------------------------------------------------------------------
// Shared transition
// ---------------------------------------------------------------------------

/// Flip one item's completion flag, moving it to the end of the target
/// partition. Records the change for broadcast; the caller decides which
/// persistence effect covers it. Returns false when the item is already in
/// the requested state (its timestamp is then left alone).
fn flip_completion(
    tree: &mut ItemTree,
    id: &str,
    completed: bool,
    now: DateTime<Utc>,
    out: &mut CascadeOutcome,
    touched: &mut TouchedScopes,
) -> bool {
    let Some(item) = tree.get(id) else {
        return false;
    };
    if item.is_completed == completed {
        return false;
    }
    let parent_id = item.parent_id.clone();
    let end = tree.partition_len(parent_id.as_deref(), completed);

    let item = tree.get_mut(id).expect("checked above");
    item.sort_order = end;
    if completed {
        item.mark_completed(now);
    } else {
        item.mark_uncompleted();
    }
    out.changes.push(CompletionChange {
        id: id.to_string(),
        is_completed: completed,
        completed_at: item.completed_at,
    });
    touched.moved(id, end, parent_id);
    true
}

/// Partition moves performed by a cascade, plus the scopes whose
/// partitions need renumbering once it settles
#[derive(Debug, Default)]
struct TouchedScopes {
    scopes: Vec<Option<String>>,
    moves: Vec<SortUpdate>,
}

impl TouchedScopes {
    fn moved(&mut self, id: &str, sort_order: usize, scope: Option<String>) {
        self.moves.push(SortUpdate {
            id: id.to_string(),
            sort_order,
        });
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
    }

    /// Landing at the end of the target partition is already contiguous,
    /// so normalization only ever renumbers the items left behind.
    fn normalize(self, tree: &mut ItemTree) -> Vec<SortUpdate> {
        let mut updates = self.moves;
        for scope in self.scopes {
            updates.extend(tree.normalize_scope(scope.as_deref()));
        }
        updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemKind;
    use pretty_assertions::assert_eq;

    /// Parent with three incomplete children a, b, c (sort order 0, 1, 2)
    fn family() -> (ItemTree, String, Vec<String>) {
        let mut tree = ItemTree::new();
        let (parent, _) = tree.insert_new(None, ItemKind::Project, "parent".into());
        for title in ["c", "b", "a"] {
            tree.insert_new(Some(&parent), ItemKind::Task, title.into());
        }
        let children = tree.sibling_ids(Some(&parent), false);
        (tree, parent, children)
    }

    fn completed(tree: &ItemTree, id: &str) -> bool {
        tree.get(id).unwrap().is_completed
    }

    #[test]
    fn leaf_toggle_flips_and_stamps() {
        let mut tree = ItemTree::new();
        let (id, _) = tree.insert_new(None, ItemKind::Task, "solo".into());
        let now = Utc::now();

        let out = toggle(&mut tree, &id, now).unwrap();
        assert!(completed(&tree, &id));
        assert_eq!(tree.get(&id).unwrap().completed_at, Some(now));
        assert_eq!(
            out.changes,
            vec![CompletionChange {
                id: id.clone(),
                is_completed: true,
                completed_at: Some(now),
            }]
        );
        assert!(matches!(
            out.effects[0],
            PersistAction::SetCompleted { completed: true, .. }
        ));
    }

    #[test]
    fn leaf_toggle_twice_restores_flag_and_clears_timestamp() {
        let mut tree = ItemTree::new();
        let (id, _) = tree.insert_new(None, ItemKind::Task, "solo".into());

        toggle(&mut tree, &id, Utc::now()).unwrap();
        toggle(&mut tree, &id, Utc::now()).unwrap();

        let item = tree.get(&id).unwrap();
        assert!(!item.is_completed);
        assert!(item.completed_at.is_none());
    }

    #[test]
    fn missing_id_returns_none() {
        let mut tree = ItemTree::new();
        assert!(toggle(&mut tree, "itm-9999", Utc::now()).is_none());
    }

    // --- Rule 1 ---

    #[test]
    fn direct_parent_completion_completes_children_and_snapshots() {
        let (mut tree, parent, children) = family();
        // b already complete before the parent toggle
        toggle(&mut tree, &children[1], Utc::now()).unwrap();
        let b_stamp = tree.get(&children[1]).unwrap().completed_at;

        let now = Utc::now();
        toggle(&mut tree, &parent, now).unwrap();

        assert!(completed(&tree, &parent));
        for child in &children {
            assert!(completed(&tree, child));
        }
        // Snapshot holds the pre-completion states in creation order (c, b, a)
        let snap = tree
            .get(&parent)
            .unwrap()
            .previous_completion_state
            .clone()
            .unwrap();
        assert_eq!(snap, vec![false, true, false]);
        // The already-complete child keeps its original timestamp
        assert_eq!(tree.get(&children[1]).unwrap().completed_at, b_stamp);
    }

    #[test]
    fn direct_parent_completion_emits_save_then_child_flips() {
        let (mut tree, parent, _) = family();
        let out = toggle(&mut tree, &parent, Utc::now()).unwrap();

        match &out.effects[0] {
            PersistAction::Save(item) => {
                assert_eq!(item.id, parent);
                assert!(item.is_completed);
                assert!(item.previous_completion_state.is_some());
            }
            other => panic!("expected Save first, got {:?}", other),
        }
        let child_flips = out
            .effects
            .iter()
            .filter(|e| matches!(e, PersistAction::SetCompleted { completed: true, .. }))
            .count();
        assert_eq!(child_flips, 3);
    }

    // --- Rule 2 ---

    #[test]
    fn direct_parent_uncompletion_restores_snapshot() {
        let (mut tree, parent, children) = family();
        toggle(&mut tree, &children[1], Utc::now()).unwrap(); // b complete
        toggle(&mut tree, &parent, Utc::now()).unwrap(); // snapshot [c:false, b:true, a:false]

        let out = toggle(&mut tree, &parent, Utc::now()).unwrap();

        assert!(!completed(&tree, &parent));
        assert!(!completed(&tree, &children[0])); // a back to incomplete
        assert!(completed(&tree, &children[1])); // b stays complete
        assert!(!completed(&tree, &children[2])); // c back to incomplete
        // Snapshot consumed
        assert!(
            tree.get(&parent)
                .unwrap()
                .previous_completion_state
                .is_none()
        );
        assert!(out.effects.iter().any(|e| matches!(
            e,
            PersistAction::RestoreChildren { states, .. } if states == &vec![false, true, false]
        )));
    }

    #[test]
    fn stale_snapshot_leaves_children_alone() {
        let (mut tree, parent, _) = family();
        toggle(&mut tree, &parent, Utc::now()).unwrap();
        // Child set changes after the snapshot was captured
        tree.insert_new(Some(&parent), ItemKind::Task, "d".into());

        let out = toggle(&mut tree, &parent, Utc::now()).unwrap();

        assert!(!completed(&tree, &parent));
        // The original three children stay complete; no restore was issued
        let still_complete = tree
            .children_canonical(&parent)
            .iter()
            .filter(|c| c.is_completed)
            .count();
        assert_eq!(still_complete, 3);
        assert!(
            !out.effects
                .iter()
                .any(|e| matches!(e, PersistAction::RestoreChildren { .. }))
        );
        // The stale snapshot is discarded rather than kept around
        assert!(
            tree.get(&parent)
                .unwrap()
                .previous_completion_state
                .is_none()
        );
    }

    // --- Rule 3 ---

    #[test]
    fn last_child_completion_auto_completes_parent_without_snapshot() {
        let (mut tree, parent, children) = family();
        for child in &children {
            toggle(&mut tree, child, Utc::now()).unwrap();
        }

        assert!(completed(&tree, &parent));
        assert!(
            tree.get(&parent)
                .unwrap()
                .previous_completion_state
                .is_none()
        );
    }

    #[test]
    fn child_uncompletion_auto_uncompletes_parent_leaving_siblings() {
        let (mut tree, parent, children) = family();
        for child in &children {
            toggle(&mut tree, child, Utc::now()).unwrap();
        }
        assert!(completed(&tree, &parent));

        // Toggle one child back
        toggle(&mut tree, &children[0], Utc::now()).unwrap();

        assert!(!completed(&tree, &parent));
        assert!(tree.get(&parent).unwrap().completed_at.is_none());
        assert!(!completed(&tree, &children[0]));
        // The intentional asymmetry: the other children stay complete
        assert!(completed(&tree, &children[1]));
        assert!(completed(&tree, &children[2]));
    }

    #[test]
    fn partial_child_completion_does_not_touch_parent() {
        let (mut tree, parent, children) = family();
        let out = toggle(&mut tree, &children[0], Utc::now()).unwrap();

        assert!(!completed(&tree, &parent));
        assert!(out.changes.iter().all(|c| c.id != parent));
    }

    #[test]
    fn direct_uncomplete_after_auto_complete_leaves_children_complete() {
        // The worked asymmetry scenario: complete a, b, c one by one, then
        // directly toggle the auto-completed parent back off
        let (mut tree, parent, children) = family();
        for child in &children {
            toggle(&mut tree, child, Utc::now()).unwrap();
        }
        assert!(completed(&tree, &parent));

        toggle(&mut tree, &parent, Utc::now()).unwrap();

        assert!(!completed(&tree, &parent));
        // No snapshot was ever captured, so the children stay complete
        for child in &children {
            assert!(completed(&tree, child));
        }
    }

    #[test]
    fn auto_transitions_ride_through_grandparents() {
        let mut tree = ItemTree::new();
        let (top, _) = tree.insert_new(None, ItemKind::Project, "top".into());
        let (mid, _) = tree.insert_new(Some(&top), ItemKind::Task, "mid".into());
        let (leaf, _) = tree.insert_new(Some(&mid), ItemKind::Task, "leaf".into());

        toggle(&mut tree, &leaf, Utc::now()).unwrap();
        assert!(completed(&tree, &mid));
        assert!(completed(&tree, &top));

        toggle(&mut tree, &leaf, Utc::now()).unwrap();
        assert!(!completed(&tree, &mid));
        assert!(!completed(&tree, &top));
    }

    // --- Partition bookkeeping ---

    #[test]
    fn partitions_stay_contiguous_through_cascades() {
        let (mut tree, parent, children) = family();
        toggle(&mut tree, &children[1], Utc::now()).unwrap();

        let open: Vec<usize> = tree
            .siblings(Some(&parent), false)
            .iter()
            .map(|i| i.sort_order)
            .collect();
        let done: Vec<usize> = tree
            .siblings(Some(&parent), true)
            .iter()
            .map(|i| i.sort_order)
            .collect();
        assert_eq!(open, vec![0, 1]);
        assert_eq!(done, vec![0]);
    }

    #[test]
    fn completion_order_becomes_done_partition_order() {
        let (mut tree, parent, children) = family();
        // Complete c then a: done partition should read c, a
        toggle(&mut tree, &children[2], Utc::now()).unwrap();
        toggle(&mut tree, &children[0], Utc::now()).unwrap();

        let done = tree.sibling_ids(Some(&parent), true);
        assert_eq!(done, vec![children[2].clone(), children[0].clone()]);
    }

    #[test]
    fn uncompleted_item_returns_to_end_of_open_partition() {
        let (mut tree, parent, children) = family();
        toggle(&mut tree, &children[0], Utc::now()).unwrap();
        toggle(&mut tree, &children[0], Utc::now()).unwrap();

        let open = tree.sibling_ids(Some(&parent), false);
        assert_eq!(
            open,
            vec![
                children[1].clone(),
                children[2].clone(),
                children[0].clone()
            ]
        );
    }
}
