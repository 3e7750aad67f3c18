use crate::model::{ItemTree, SortUpdate};

/// Reorder one uncompleted sibling scope by dropping `dropped_id` onto
/// `target_id`: the dropped item is removed from the sequence and
/// reinserted at the target's former position (list-splice, not swap),
/// then positions are reassigned `0..n-1`.
///
/// Completed siblings are not part of the scope and keep their own
/// ordering untouched.
///
/// Returns the minimal set of `(id, new_sort_order)` pairs — empty when
/// the move is a no-op (same id, either id missing from the scope, or the
/// resulting sequence equals the current one), in which case nothing is
/// mutated.
pub fn reorder(
    tree: &mut ItemTree,
    parent_id: Option<&str>,
    dropped_id: &str,
    target_id: &str,
) -> Vec<SortUpdate> {
    if dropped_id == target_id {
        return Vec::new();
    }

    let order = tree.sibling_ids(parent_id, false);
    let Some(from) = order.iter().position(|id| id == dropped_id) else {
        return Vec::new();
    };
    let Some(to) = order.iter().position(|id| id == target_id) else {
        return Vec::new();
    };

    let mut next = order.clone();
    let moved = next.remove(from);
    next.insert(to, moved);
    if next == order {
        return Vec::new();
    }

    let mut updates = Vec::new();
    for (index, id) in next.iter().enumerate() {
        if let Some(item) = tree.get_mut(id)
            && item.sort_order != index
        {
            item.sort_order = index;
            updates.push(SortUpdate {
                id: id.clone(),
                sort_order: index,
            });
        }
    }
    updates
}
