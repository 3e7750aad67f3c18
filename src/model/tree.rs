use indexmap::IndexMap;

use super::item::{Item, ItemKind};

/// A single persisted sort-order change: `(id, new position)`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SortUpdate {
    pub id: String,
    pub sort_order: usize,
}

/// Arena of items keyed by id. Parent/child structure is derived from
/// `parent_id` back-references on demand; children never hold a reference
/// to their parent object.
///
/// Sibling scopes (same parent, same completion partition) are the unit of
/// ordering: within each scope `sort_order` is contiguous `0..n-1`.
#[derive(Debug, Clone, Default)]
pub struct ItemTree {
    items: IndexMap<String, Item>,
}

impl ItemTree {
    pub fn new() -> Self {
        ItemTree {
            items: IndexMap::new(),
        }
    }

    /// Build a tree from already-persisted items (e.g. a store refetch)
    pub fn from_items(items: Vec<Item>) -> Self {
        let mut tree = ItemTree::new();
        for item in items {
            tree.items.insert(item.id.clone(), item);
        }
        tree
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Item> {
        self.items.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Next free id of the form `itm-NNNN`
    pub fn next_id(&self) -> String {
        let mut max = 0usize;
        for id in self.items.keys() {
            if let Some(num) = id.strip_prefix("itm-")
                && let Ok(n) = num.parse::<usize>()
                && n > max
            {
                max = n;
            }
        }
        format!("itm-{:04}", max + 1)
    }

    // -----------------------------------------------------------------------
    // Scope queries
    // -----------------------------------------------------------------------

    /// Items of one sibling scope, ordered by `sort_order`
    pub fn siblings(&self, parent_id: Option<&str>, completed: bool) -> Vec<&Item> {
        let mut scope: Vec<&Item> = self
            .items
            .values()
            .filter(|i| i.parent_id.as_deref() == parent_id && i.is_completed == completed)
            .collect();
        scope.sort_by_key(|i| i.sort_order);
        scope
    }

    /// Ids of one sibling scope, ordered by `sort_order`
    pub fn sibling_ids(&self, parent_id: Option<&str>, completed: bool) -> Vec<String> {
        self.siblings(parent_id, completed)
            .into_iter()
            .map(|i| i.id.clone())
            .collect()
    }

    /// Number of items in one sibling scope
    pub fn partition_len(&self, parent_id: Option<&str>, completed: bool) -> usize {
        self.items
            .values()
            .filter(|i| i.parent_id.as_deref() == parent_id && i.is_completed == completed)
            .count()
    }

    /// All children of a parent across both completion partitions, in
    /// creation order (`created_at`, then id). Creation order is stable
    /// across completion toggles, so completion snapshots index into it.
    pub fn children_canonical(&self, parent_id: &str) -> Vec<&Item> {
        let mut children: Vec<&Item> = self
            .items
            .values()
            .filter(|i| i.parent_id.as_deref() == Some(parent_id))
            .collect();
        children.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        children
    }

    /// Ids of all children in canonical (creation) order
    pub fn child_ids_canonical(&self, parent_id: &str) -> Vec<String> {
        self.children_canonical(parent_id)
            .into_iter()
            .map(|i| i.id.clone())
            .collect()
    }

    pub fn has_children(&self, id: &str) -> bool {
        self.items
            .values()
            .any(|i| i.parent_id.as_deref() == Some(id))
    }

    /// Top-level items of one completion partition, ordered by `sort_order`
    pub fn roots(&self, completed: bool) -> Vec<&Item> {
        self.siblings(None, completed)
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Create a new item at the front of its uncompleted sibling scope.
    /// Every existing uncompleted sibling is pushed back one slot; the
    /// returned updates are the siblings that moved (the new item itself is
    /// persisted via its create call).
    pub fn insert_new(
        &mut self,
        parent_id: Option<&str>,
        kind: ItemKind,
        title: String,
    ) -> (String, Vec<SortUpdate>) {
        let id = self.next_id();
        let mut updates = Vec::new();
        for sibling in self.items.values_mut() {
            if sibling.parent_id.as_deref() == parent_id && !sibling.is_completed {
                sibling.sort_order += 1;
                updates.push(SortUpdate {
                    id: sibling.id.clone(),
                    sort_order: sibling.sort_order,
                });
            }
        }
        let item = Item::new(id.clone(), parent_id.map(str::to_string), kind, title);
        self.items.insert(id.clone(), item);
        (id, updates)
    }

    /// Insert an already-built item verbatim (store loads, cross-view patches)
    pub fn insert(&mut self, item: Item) {
        self.items.insert(item.id.clone(), item);
    }

    /// Remove an item and all of its descendants. Returns the removed items
    /// bottom-up (leaves first, the root item last), which is also the safe
    /// order for remote deletion.
    pub fn remove_subtree(&mut self, id: &str) -> Vec<Item> {
        if !self.items.contains_key(id) {
            return Vec::new();
        }
        let mut ordered = Vec::new();
        self.collect_subtree(id, &mut ordered);
        ordered.reverse();
        ordered
            .into_iter()
            .filter_map(|id| self.items.shift_remove(&id))
            .collect()
    }

    fn collect_subtree(&self, id: &str, out: &mut Vec<String>) {
        out.push(id.to_string());
        for child_id in self.child_ids_canonical(id) {
            self.collect_subtree(&child_id, out);
        }
    }

    /// Renumber both completion partitions of a scope to contiguous
    /// `0..n-1`, preserving relative order. Returns only the items whose
    /// `sort_order` actually changed.
    pub fn normalize_scope(&mut self, parent_id: Option<&str>) -> Vec<SortUpdate> {
        let mut updates = Vec::new();
        for completed in [false, true] {
            let ordered = self.sibling_ids(parent_id, completed);
            for (index, id) in ordered.iter().enumerate() {
                if let Some(item) = self.items.get_mut(id)
                    && item.sort_order != index
                {
                    item.sort_order = index;
                    updates.push(SortUpdate {
                        id: id.clone(),
                        sort_order: index,
                    });
                }
            }
        }
        updates
    }
}
