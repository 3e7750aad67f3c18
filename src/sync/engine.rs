use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::model::{ItemKind, ItemTree};
use crate::ops::{cascade, resequence};
use crate::store::{ItemStore, PersistAction, StoreError};
use crate::view::{DisplayRow, ViewOptions, flatten, translate_move};

use super::notify::{ChangeNotifier, CompletionUpdate};

/// A user-level mutation of the item tree
#[derive(Debug, Clone)]
pub enum Operation {
    Create {
        parent_id: Option<String>,
        kind: ItemKind,
        title: String,
    },
    UpdateTitle {
        id: String,
        title: String,
    },
    ToggleCompletion {
        id: String,
    },
    Reorder {
        parent_id: Option<String>,
        dropped_id: String,
        target_id: String,
    },
    Delete {
        id: String,
    },
    MoveCategory {
        id: String,
        category_id: Option<String>,
    },
}

/// Validation errors, rejected before any state is touched
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("title cannot be empty")]
    EmptyTitle,
    #[error("no user is signed in")]
    NotSignedIn,
    #[error("item not found: {0}")]
    NotFound(String),
}

/// One screen's view of the item tree: the in-memory model, its expansion
/// state, and the apply-then-reconcile seam to the remote store.
///
/// `apply` mutates the in-memory model synchronously (optimistically) and
/// queues the matching store calls on a background task. A persistence
/// failure surfaces as a drainable message and is logged; the optimistic
/// mutation is deliberately NOT rolled back — local and remote state may
/// diverge until the next [`Engine::load`]. Callers that need stricter
/// behavior get a single seam to change here rather than at every call
/// site.
pub struct Engine {
    tree: ItemTree,
    expanded: HashSet<String>,
    store: Arc<dyn ItemStore>,
    notifier: ChangeNotifier,
    /// Screen name stamped on outgoing updates so we can skip our own
    origin: String,
    user_id: Option<String>,
    errors: Arc<Mutex<Vec<String>>>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn ItemStore>,
        notifier: ChangeNotifier,
        origin: impl Into<String>,
        user_id: Option<String>,
    ) -> Self {
        Engine {
            tree: ItemTree::new(),
            expanded: HashSet::new(),
            store,
            notifier,
            origin: origin.into(),
            user_id,
            errors: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn tree(&self) -> &ItemTree {
        &self.tree
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Error messages accumulated by failed background persistence,
    /// oldest first. Draining clears them.
    pub fn drain_errors(&self) -> Vec<String> {
        std::mem::take(&mut *self.errors.lock().unwrap())
    }

    // -----------------------------------------------------------------------
    // Expansion state
    // -----------------------------------------------------------------------

    pub fn expand(&mut self, id: &str) {
        self.expanded.insert(id.to_string());
    }

    pub fn collapse(&mut self, id: &str) {
        self.expanded.remove(id);
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    /// Expand every current top-level item (CLI list output)
    pub fn expand_all(&mut self) {
        let ids: Vec<String> = self.tree.iter().map(|i| i.id.clone()).collect();
        self.expanded.extend(ids);
    }

    // -----------------------------------------------------------------------
    // Projection
    // -----------------------------------------------------------------------

    /// Current flat display projection
    pub fn rows(&self, opts: &ViewOptions) -> Vec<DisplayRow> {
        flatten(&self.tree, &self.expanded, opts)
    }

    /// Drag row `from` onto row `to` in the current projection. Moves that
    /// cross a scope boundary (or land on a synthetic row) are no-ops, as
    /// is any drag while the view isn't in ascending manual order.
    pub fn move_row(
        &mut self,
        from: usize,
        to: usize,
        opts: &ViewOptions,
    ) -> Result<JoinHandle<()>, EngineError> {
        let rows = self.rows(opts);
        match translate_move(&rows, from, to, opts) {
            Some(mv) => self.apply(Operation::Reorder {
                parent_id: mv.parent_id,
                dropped_id: mv.dropped_id,
                target_id: mv.target_id,
            }),
            None => Ok(self.spawn_persist(Vec::new())),
        }
    }

    // -----------------------------------------------------------------------
    // Apply + reconcile
    // -----------------------------------------------------------------------

    /// Apply an operation: validate, mutate the in-memory model
    /// synchronously, then persist in the background.
    ///
    /// The returned handle is fire-and-forget for UI callers; tests await
    /// it to observe the persisted state.
    pub fn apply(&mut self, op: Operation) -> Result<JoinHandle<()>, EngineError> {
        if self.user_id.is_none() {
            return Err(EngineError::NotSignedIn);
        }

        let actions = match op {
            Operation::Create {
                parent_id,
                kind,
                title,
            } => {
                let title = title.trim().to_string();
                if title.is_empty() {
                    return Err(EngineError::EmptyTitle);
                }
                if let Some(pid) = &parent_id
                    && !self.tree.contains(pid)
                {
                    return Err(EngineError::NotFound(pid.clone()));
                }
                let (id, shifted) = self.tree.insert_new(parent_id.as_deref(), kind, title);
                let item = self.tree.get(&id).expect("just inserted").clone();
                tracing::debug!(item = %id, "created");
                let mut actions = vec![PersistAction::Create(item)];
                if !shifted.is_empty() {
                    actions.push(PersistAction::SortOrders(shifted));
                }
                actions
            }

            Operation::UpdateTitle { id, title } => {
                let title = title.trim().to_string();
                if title.is_empty() {
                    return Err(EngineError::EmptyTitle);
                }
                let item = self
                    .tree
                    .get_mut(&id)
                    .ok_or_else(|| EngineError::NotFound(id.clone()))?;
                item.title = title;
                vec![PersistAction::Save(item.clone())]
            }

            Operation::ToggleCompletion { id } => {
                let outcome = cascade::toggle(&mut self.tree, &id, Utc::now())
                    .ok_or_else(|| EngineError::NotFound(id.clone()))?;
                for change in &outcome.changes {
                    self.notifier.notify(CompletionUpdate {
                        item_id: change.id.clone(),
                        is_completed: change.is_completed,
                        completed_at: change.completed_at,
                        origin: self.origin.clone(),
                    });
                }
                outcome.effects
            }

            Operation::Reorder {
                parent_id,
                dropped_id,
                target_id,
            } => {
                let updates = resequence::reorder(
                    &mut self.tree,
                    parent_id.as_deref(),
                    &dropped_id,
                    &target_id,
                );
                if updates.is_empty() {
                    Vec::new()
                } else {
                    vec![PersistAction::SortOrders(updates)]
                }
            }

            Operation::Delete { id } => {
                let removed = self.tree.remove_subtree(&id);
                if removed.is_empty() {
                    return Err(EngineError::NotFound(id));
                }
                let scope = removed
                    .last()
                    .expect("non-empty")
                    .parent_id
                    .clone();
                let renumbered = self.tree.normalize_scope(scope.as_deref());
                let mut actions: Vec<PersistAction> = removed
                    .into_iter()
                    .map(|item| PersistAction::Delete(item.id))
                    .collect();
                if !renumbered.is_empty() {
                    actions.push(PersistAction::SortOrders(renumbered));
                }
                actions
            }

            Operation::MoveCategory { id, category_id } => {
                let item = self
                    .tree
                    .get_mut(&id)
                    .ok_or_else(|| EngineError::NotFound(id.clone()))?;
                item.category_id = category_id;
                vec![PersistAction::Save(item.clone())]
            }
        };

        Ok(self.spawn_persist(actions))
    }

    /// Run store calls on a detached task. The first failure stops the
    /// run — earlier calls stay applied on the remote side, the same way
    /// the local mutation stays applied here.
    fn spawn_persist(&self, actions: Vec<PersistAction>) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let errors = Arc::clone(&self.errors);
        tokio::spawn(async move {
            for action in actions {
                let what = action.describe();
                if let Err(e) = action.run(store.as_ref()).await {
                    tracing::warn!(error = %e, "background persistence failed");
                    errors.lock().unwrap().push(format!("{}: {}", what, e));
                    break;
                }
            }
        })
    }

    // -----------------------------------------------------------------------
    // Refetch + cross-view sync
    // -----------------------------------------------------------------------

    /// Replace the in-memory model with a full refetch from the store —
    /// the only resynchronization mechanism after local and remote state
    /// diverge.
    pub async fn load(&mut self) -> Result<(), StoreError> {
        let mut items = Vec::new();
        let mut pending: Vec<Option<String>> = vec![None];
        while let Some(parent_id) = pending.pop() {
            let children = self.store.fetch_children(parent_id.as_deref()).await?;
            for child in &children {
                pending.push(Some(child.id.clone()));
            }
            items.extend(children);
        }
        tracing::debug!(items = items.len(), "loaded tree from store");
        self.tree = ItemTree::from_items(items);
        Ok(())
    }

    /// Patch a completion update broadcast by another screen into this
    /// screen's copy of the item. Our own updates and unknown items are
    /// ignored. No persistence happens here — the originating screen
    /// already did it.
    pub fn absorb(&mut self, update: &CompletionUpdate) -> bool {
        if update.origin == self.origin {
            return false;
        }
        let Some(item) = self.tree.get(&update.item_id) else {
            return false;
        };
        if item.is_completed == update.is_completed {
            return false;
        }
        let parent_id = item.parent_id.clone();
        let end = self
            .tree
            .partition_len(parent_id.as_deref(), update.is_completed);

        let item = self.tree.get_mut(&update.item_id).expect("checked above");
        item.is_completed = update.is_completed;
        item.completed_at = update.completed_at;
        item.sort_order = end;
        self.tree.normalize_scope(parent_id.as_deref());
        true
    }
}
