//! In-process document store for tests and dry runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use psytest_core::traits::{Document, DocumentStore, Filter};
use psytest_core::Result;

use crate::error::StoreError;

type Collection = BTreeMap<String, Document>;

/// A document store held entirely in memory.
///
/// Counts every call and can be told to fail the next few calls with a
/// network error.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Collection>>,
    call_count: AtomicU32,
    failures_remaining: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls made to this store.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Fail the next `n` calls with a network error.
    pub fn fail_next(&self, n: u32) {
        self.failures_remaining.store(n, Ordering::Relaxed);
    }

    /// Number of documents in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.lock().get(collection).map_or(0, BTreeMap::len)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Collection>> {
        // a poisoned map is still consistent: every write is a single insert/remove
        self.collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self) -> std::result::Result<(), StoreError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        let injected = self
            .failures_remaining
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::NetworkError("injected failure".into()));
        }
        Ok(())
    }

    fn not_found(collection: &str, id: &str) -> StoreError {
        StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Document>> {
        self.enter()?;
        let docs = self
            .lock()
            .get(collection)
            .map(|c| {
                c.values()
                    .filter(|d| filters.iter().all(|f| f.matches(&d.data)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(docs)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Document> {
        self.enter()?;
        self.lock()
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned()
            .ok_or_else(|| Self::not_found(collection, id).into())
    }

    async fn create(&self, collection: &str, id: Option<&str>, data: Value) -> Result<String> {
        self.enter()?;
        let id = id.map_or_else(|| Uuid::new_v4().to_string(), String::from);
        let mut collections = self.lock();
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.contains_key(&id) {
            return Err(StoreError::Duplicate {
                collection: collection.to_string(),
                id,
            }
            .into());
        }
        let now = Utc::now();
        docs.insert(
            id.clone(),
            Document {
                id: id.clone(),
                data,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, data: Value) -> Result<()> {
        self.enter()?;
        let mut collections = self.lock();
        let doc = collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| Self::not_found(collection, id))?;
        doc.data = data;
        doc.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.enter()?;
        self.lock()
            .get_mut(collection)
            .and_then(|c| c.remove(id))
            .map(|_| ())
            .ok_or_else(|| Self::not_found(collection, id).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psytest_core::TestError;
    use serde_json::json;

    #[tokio::test]
    async fn create_get_update_delete() {
        let store = MemoryStore::new();
        let id = store
            .create("questions", None, json!({"category": "verbal"}))
            .await
            .unwrap();
        assert!(Uuid::parse_str(&id).is_ok());

        let doc = store.get("questions", &id).await.unwrap();
        assert_eq!(doc.data["category"], "verbal");

        store
            .update("questions", &id, json!({"category": "numeric"}))
            .await
            .unwrap();
        let doc = store.get("questions", &id).await.unwrap();
        assert_eq!(doc.data["category"], "numeric");
        assert!(doc.updated_at >= doc.created_at);

        store.delete("questions", &id).await.unwrap();
        let err = store.get("questions", &id).await.unwrap_err();
        assert!(matches!(err, TestError::NotFound { .. }));
        assert_eq!(store.call_count(), 5);
    }

    #[tokio::test]
    async fn explicit_duplicate_id_rejected() {
        let store = MemoryStore::new();
        store.create("blocks", Some("b1"), json!({})).await.unwrap();
        let err = store.create("blocks", Some("b1"), json!({})).await.unwrap_err();
        assert!(matches!(err, TestError::Validation(_)));
        assert_eq!(store.len("blocks"), 1);
    }

    #[tokio::test]
    async fn fetch_applies_all_filters() {
        let store = MemoryStore::new();
        store
            .create("questions", Some("a"), json!({"category": "verbal", "status": "active"}))
            .await
            .unwrap();
        store
            .create("questions", Some("b"), json!({"category": "verbal", "status": "draft"}))
            .await
            .unwrap();
        store
            .create("questions", Some("c"), json!({"category": "numeric", "status": "active"}))
            .await
            .unwrap();

        let docs = store
            .fetch(
                "questions",
                &[Filter::eq("category", "verbal"), Filter::eq("status", "active")],
            )
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "a");
        assert!(store.fetch("missing", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn injected_failures_are_network_errors() {
        let store = MemoryStore::new();
        store.fail_next(2);
        for _ in 0..2 {
            let err = store.fetch("tests", &[]).await.unwrap_err();
            assert!(matches!(err, TestError::Network(_)));
        }
        assert!(store.fetch("tests", &[]).await.is_ok());
        assert_eq!(store.call_count(), 3);
    }
}
