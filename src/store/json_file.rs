use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::model::{Category, Item, SortUpdate};

use super::{CategoryStore, ItemStore, StoreError};

/// On-disk document layout of the state file
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    items: Vec<Item>,
    #[serde(default)]
    categories: Vec<Category>,
}

/// Store backend that keeps the whole state in one JSON file, rewritten
/// atomically (write-then-rename) on every mutation. This is the CLI's
/// stand-in for a hosted backend; the lists involved are small enough
/// that whole-document writes are fine.
pub struct JsonFileStore {
    path: PathBuf,
    doc: Mutex<StoreDocument>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty when the file doesn't
    /// exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let doc = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            StoreDocument::default()
        };
        Ok(JsonFileStore {
            path,
            doc: Mutex::new(doc),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, doc: &StoreDocument) -> Result<(), StoreError> {
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut tmp = NamedTempFile::new_in(dir.unwrap_or(Path::new(".")))?;
        serde_json::to_writer_pretty(&mut tmp, doc)?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

#[async_trait]
impl ItemStore for JsonFileStore {
    async fn fetch_children(&self, parent_id: Option<&str>) -> Result<Vec<Item>, StoreError> {
        let doc = self.doc.lock().unwrap();
        let mut children: Vec<Item> = doc
            .items
            .iter()
            .filter(|i| i.parent_id.as_deref() == parent_id)
            .cloned()
            .collect();
        children.sort_by_key(|i| (i.is_completed, i.sort_order));
        Ok(children)
    }

    async fn create(&self, item: &Item) -> Result<Item, StoreError> {
        let mut doc = self.doc.lock().unwrap();
        doc.items.push(item.clone());
        self.flush(&doc)?;
        Ok(item.clone())
    }

    async fn update(&self, item: &Item) -> Result<(), StoreError> {
        let mut doc = self.doc.lock().unwrap();
        let slot = doc
            .items
            .iter_mut()
            .find(|i| i.id == item.id)
            .ok_or_else(|| StoreError::NotFound(item.id.clone()))?;
        *slot = item.clone();
        self.flush(&doc)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut doc = self.doc.lock().unwrap();
        let before = doc.items.len();
        doc.items.retain(|i| i.id != id);
        if doc.items.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.flush(&doc)
    }

    async fn set_completed(&self, id: &str, completed: bool) -> Result<(), StoreError> {
        let mut doc = self.doc.lock().unwrap();
        let item = doc
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if completed {
            item.mark_completed(Utc::now());
        } else {
            item.mark_uncompleted();
        }
        self.flush(&doc)
    }

    async fn update_sort_orders(&self, updates: &[SortUpdate]) -> Result<(), StoreError> {
        let mut doc = self.doc.lock().unwrap();
        for update in updates {
            let item = doc
                .items
                .iter_mut()
                .find(|i| i.id == update.id)
                .ok_or_else(|| StoreError::NotFound(update.id.clone()))?;
            item.sort_order = update.sort_order;
        }
        self.flush(&doc)
    }

    async fn restore_child_states(
        &self,
        parent_id: &str,
        states: &[bool],
    ) -> Result<(), StoreError> {
        let mut doc = self.doc.lock().unwrap();
        let mut child_ids: Vec<(chrono::DateTime<Utc>, String)> = doc
            .items
            .iter()
            .filter(|i| i.parent_id.as_deref() == Some(parent_id))
            .map(|i| (i.created_at, i.id.clone()))
            .collect();
        child_ids.sort();
        if child_ids.len() != states.len() {
            return Ok(());
        }
        for ((_, id), &state) in child_ids.iter().zip(states.iter()) {
            let item = doc
                .items
                .iter_mut()
                .find(|i| &i.id == id)
                .expect("enumerated above");
            if state {
                item.mark_completed(Utc::now());
            } else {
                item.mark_uncompleted();
            }
        }
        self.flush(&doc)
    }
}

#[async_trait]
impl CategoryStore for JsonFileStore {
    async fn fetch_categories(&self) -> Result<Vec<Category>, StoreError> {
        let doc = self.doc.lock().unwrap();
        let mut all = doc.categories.clone();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn create_category(&self, category: &Category) -> Result<(), StoreError> {
        let mut doc = self.doc.lock().unwrap();
        doc.categories.push(category.clone());
        self.flush(&doc)
    }

    async fn rename_category(&self, id: &str, name: &str) -> Result<(), StoreError> {
        let mut doc = self.doc.lock().unwrap();
        let category = doc
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::CategoryNotFound(id.to_string()))?;
        category.name = name.to_string();
        self.flush(&doc)
    }

    async fn delete_category_reassigning(
        &self,
        id: &str,
        into: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut doc = self.doc.lock().unwrap();
        let before = doc.categories.len();
        doc.categories.retain(|c| c.id != id);
        if doc.categories.len() == before {
            return Err(StoreError::CategoryNotFound(id.to_string()));
        }
        if let Some(target) = into
            && !doc.categories.iter().any(|c| c.id == target)
        {
            return Err(StoreError::CategoryNotFound(target.to_string()));
        }
        for item in doc.items.iter_mut() {
            if item.category_id.as_deref() == Some(id) {
                item.category_id = into.map(str::to_string);
            }
        }
        self.flush(&doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemKind;
    use tempfile::TempDir;

    fn item(id: &str, parent: Option<&str>) -> Item {
        Item::new(
            id.to_string(),
            parent.map(str::to_string),
            ItemKind::Task,
            format!("item {}", id),
        )
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::open(tmp.path().join("state.json")).unwrap();
        assert!(store.fetch_children(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.create(&item("itm-0001", None)).await.unwrap();
        store.create(&item("itm-0002", Some("itm-0001"))).await.unwrap();
        store.set_completed("itm-0002", true).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        let roots = reopened.fetch_children(None).await.unwrap();
        assert_eq!(roots.len(), 1);
        let children = reopened.fetch_children(Some("itm-0001")).await.unwrap();
        assert_eq!(children.len(), 1);
        assert!(children[0].is_completed);
        assert!(children[0].completed_at.is_some());
    }

    #[tokio::test]
    async fn delete_persists() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.create(&item("itm-0001", None)).await.unwrap();
        store.delete("itm-0001").await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        assert!(reopened.fetch_children(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_missing_errors_without_writing() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::open(tmp.path().join("state.json")).unwrap();
        let err = store.delete("itm-0001").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn categories_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");

        let store = JsonFileStore::open(&path).unwrap();
        store
            .create_category(&Category::new("cat-1".into(), "Home".into()))
            .await
            .unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        let categories = reopened.fetch_categories().await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "Home");
    }
}
