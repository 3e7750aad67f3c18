use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use crate::model::{Category, Item, SortUpdate};

use super::{CategoryStore, ItemStore, StoreError};

/// In-memory store backend. Backs unit tests and examples; also the
/// reference semantics for `restore_child_states` child ordering.
#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, Item>>,
    categories: Mutex<HashMap<String, Category>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Simulate losing the connection: every call fails until restored
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection lost".into()))
        } else {
            Ok(())
        }
    }

    /// Direct snapshot of every stored item (test inspection)
    pub fn all_items(&self) -> Vec<Item> {
        self.items.lock().unwrap().values().cloned().collect()
    }

    /// Direct lookup (test inspection)
    pub fn item(&self, id: &str) -> Option<Item> {
        self.items.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn fetch_children(&self, parent_id: Option<&str>) -> Result<Vec<Item>, StoreError> {
        self.check_online()?;
        let items = self.items.lock().unwrap();
        let mut children: Vec<Item> = items
            .values()
            .filter(|i| i.parent_id.as_deref() == parent_id)
            .cloned()
            .collect();
        children.sort_by_key(|i| (i.is_completed, i.sort_order));
        Ok(children)
    }

    async fn create(&self, item: &Item) -> Result<Item, StoreError> {
        self.check_online()?;
        self.items
            .lock()
            .unwrap()
            .insert(item.id.clone(), item.clone());
        Ok(item.clone())
    }

    async fn update(&self, item: &Item) -> Result<(), StoreError> {
        self.check_online()?;
        let mut items = self.items.lock().unwrap();
        if !items.contains_key(&item.id) {
            return Err(StoreError::NotFound(item.id.clone()));
        }
        items.insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.check_online()?;
        self.items
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn set_completed(&self, id: &str, completed: bool) -> Result<(), StoreError> {
        self.check_online()?;
        let mut items = self.items.lock().unwrap();
        let item = items
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if completed {
            item.mark_completed(Utc::now());
        } else {
            item.mark_uncompleted();
        }
        Ok(())
    }

    async fn update_sort_orders(&self, updates: &[SortUpdate]) -> Result<(), StoreError> {
        self.check_online()?;
        let mut items = self.items.lock().unwrap();
        for update in updates {
            let item = items
                .get_mut(&update.id)
                .ok_or_else(|| StoreError::NotFound(update.id.clone()))?;
            item.sort_order = update.sort_order;
        }
        Ok(())
    }

    async fn restore_child_states(
        &self,
        parent_id: &str,
        states: &[bool],
    ) -> Result<(), StoreError> {
        self.check_online()?;
        let mut items = self.items.lock().unwrap();
        let mut child_ids: Vec<(chrono::DateTime<Utc>, String)> = items
            .values()
            .filter(|i| i.parent_id.as_deref() == Some(parent_id))
            .map(|i| (i.created_at, i.id.clone()))
            .collect();
        child_ids.sort();
        // A snapshot that no longer matches the child set is skipped, same
        // as on the client
        if child_ids.len() != states.len() {
            return Ok(());
        }
        for ((_, id), &state) in child_ids.iter().zip(states.iter()) {
            let item = items.get_mut(id).expect("enumerated above");
            if state {
                item.mark_completed(Utc::now());
            } else {
                item.mark_uncompleted();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CategoryStore for MemoryStore {
    async fn fetch_categories(&self) -> Result<Vec<Category>, StoreError> {
        self.check_online()?;
        let categories = self.categories.lock().unwrap();
        let mut all: Vec<Category> = categories.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn create_category(&self, category: &Category) -> Result<(), StoreError> {
        self.check_online()?;
        self.categories
            .lock()
            .unwrap()
            .insert(category.id.clone(), category.clone());
        Ok(())
    }

    async fn rename_category(&self, id: &str, name: &str) -> Result<(), StoreError> {
        self.check_online()?;
        let mut categories = self.categories.lock().unwrap();
        let category = categories
            .get_mut(id)
            .ok_or_else(|| StoreError::CategoryNotFound(id.to_string()))?;
        category.name = name.to_string();
        Ok(())
    }

    async fn delete_category_reassigning(
        &self,
        id: &str,
        into: Option<&str>,
    ) -> Result<(), StoreError> {
        self.check_online()?;
        {
            let mut categories = self.categories.lock().unwrap();
            if categories.remove(id).is_none() {
                return Err(StoreError::CategoryNotFound(id.to_string()));
            }
            if let Some(target) = into
                && !categories.contains_key(target)
            {
                return Err(StoreError::CategoryNotFound(target.to_string()));
            }
        }
        let mut items = self.items.lock().unwrap();
        for item in items.values_mut() {
            if item.category_id.as_deref() == Some(id) {
                item.category_id = into.map(str::to_string);
            }
        }
        Ok(())
    }
}
