pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::model::{Category, Item, SortUpdate};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("item not found: {0}")]
    NotFound(String),
    #[error("category not found: {0}")]
    CategoryNotFound(String),
    #[error("store unreachable: {0}")]
    Unavailable(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse store file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The remote item collection. Writes are last-write-wins keyed by item
/// id; the store never pushes changes back, so divergence after a failed
/// write lasts until the next full refetch.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Items whose parent is `parent_id` (`None` = top-level items)
    async fn fetch_children(&self, parent_id: Option<&str>) -> Result<Vec<Item>, StoreError>;

    /// Store a new item, returning the stored row
    async fn create(&self, item: &Item) -> Result<Item, StoreError>;

    /// Overwrite an existing item wholesale
    async fn update(&self, item: &Item) -> Result<(), StoreError>;

    /// Delete a single item (callers delete descendants themselves,
    /// bottom-up)
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Flip one item's completion flag; the store keeps its own
    /// `completed_at` bookkeeping
    async fn set_completed(&self, id: &str, completed: bool) -> Result<(), StoreError>;

    /// Apply a batch of sort-order changes
    async fn update_sort_orders(&self, updates: &[SortUpdate]) -> Result<(), StoreError>;

    /// Restore the completion flags of `parent_id`'s children from a
    /// snapshot; indices follow child creation order
    async fn restore_child_states(
        &self,
        parent_id: &str,
        states: &[bool],
    ) -> Result<(), StoreError>;
}

/// The category collection. Treated as already-correct; only what the
/// CLI needs is implemented.
#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn fetch_categories(&self) -> Result<Vec<Category>, StoreError>;

    async fn create_category(&self, category: &Category) -> Result<(), StoreError>;

    async fn rename_category(&self, id: &str, name: &str) -> Result<(), StoreError>;

    /// Delete a category, moving items labeled with it to `into`
    /// (or clearing their label when `into` is `None`)
    async fn delete_category_reassigning(
        &self,
        id: &str,
        into: Option<&str>,
    ) -> Result<(), StoreError>;
}

/// A deferred store call queued behind an optimistic in-memory mutation.
/// The engine replays these in order on a background task; the first
/// failure stops the run and is surfaced as a user-visible message.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistAction {
    Create(Item),
    /// Full-row update (carries snapshot capture/clear, category moves,
    /// title edits)
    Save(Item),
    SetCompleted { id: String, completed: bool },
    RestoreChildren { parent_id: String, states: Vec<bool> },
    SortOrders(Vec<SortUpdate>),
    Delete(String),
}

impl PersistAction {
    /// Short description for error messages
    pub fn describe(&self) -> String {
        match self {
            PersistAction::Create(item) => format!("could not create \"{}\"", item.title),
            PersistAction::Save(item) => format!("could not save \"{}\"", item.title),
            PersistAction::SetCompleted { id, .. } => {
                format!("could not update completion of {}", id)
            }
            PersistAction::RestoreChildren { parent_id, .. } => {
                format!("could not restore items under {}", parent_id)
            }
            PersistAction::SortOrders(_) => "could not save the new order".to_string(),
            PersistAction::Delete(id) => format!("could not delete {}", id),
        }
    }

    /// Issue the corresponding store call
    pub async fn run(self, store: &dyn ItemStore) -> Result<(), StoreError> {
        match self {
            PersistAction::Create(item) => store.create(&item).await.map(|_| ()),
            PersistAction::Save(item) => store.update(&item).await,
            PersistAction::SetCompleted { id, completed } => {
                store.set_completed(&id, completed).await
            }
            PersistAction::RestoreChildren { parent_id, states } => {
                store.restore_child_states(&parent_id, &states).await
            }
            PersistAction::SortOrders(updates) => store.update_sort_orders(&updates).await,
            PersistAction::Delete(id) => store.delete(&id).await,
        }
    }
}
