//! JSON-file document store.
//!
//! Each collection lives in `<dir>/<collection>.json` as an array of
//! documents. Writes go to a temporary file that is renamed into place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use psytest_core::traits::{Document, DocumentStore, Filter};
use psytest_core::Result;

use crate::error::StoreError;

/// A document store backed by one JSON file per collection.
pub struct FileStore {
    dir: PathBuf,
    // serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }

    async fn load(&self, collection: &str) -> std::result::Result<Vec<Document>, StoreError> {
        let path = self.path_for(collection);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            collection: collection.to_string(),
            message: e.to_string(),
        })
    }

    async fn save(&self, collection: &str, docs: &[Document]) -> std::result::Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(collection);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(docs).map_err(|e| StoreError::Corrupt {
            collection: collection.to_string(),
            message: e.to_string(),
        })?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!(collection, documents = docs.len(), path = %path.display(), "collection saved");
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
impl DocumentStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Document>> {
        let docs = self.load(collection).await?;
        Ok(docs
            .into_iter()
            .filter(|d| filters.iter().all(|f| f.matches(&d.data)))
            .collect())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Document> {
        self.load(collection)
            .await?
            .into_iter()
            .find(|d| d.id == id)
            .ok_or_else(|| Self::not_found(collection, id).into())
    }

    async fn create(&self, collection: &str, id: Option<&str>, data: Value) -> Result<String> {
        let _guard = self.write_lock.lock().await;
        let mut docs = self.load(collection).await?;
        let id = id.map_or_else(|| Uuid::new_v4().to_string(), String::from);
        if docs.iter().any(|d| d.id == id) {
            return Err(StoreError::Duplicate {
                collection: collection.to_string(),
                id,
            }
            .into());
        }
        let now = Utc::now();
        docs.push(Document {
            id: id.clone(),
            data,
            created_at: now,
            updated_at: now,
        });
        self.save(collection, &docs).await?;
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, data: Value) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut docs = self.load(collection).await?;
        let doc = docs
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| Self::not_found(collection, id))?;
        doc.data = data;
        doc.updated_at = Utc::now();
        self.save(collection, &docs).await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut docs = self.load(collection).await?;
        let before = docs.len();
        docs.retain(|d| d.id != id);
        if docs.len() == before {
            return Err(Self::not_found(collection, id).into());
        }
        self.save(collection, &docs).await?;
        Ok(())
    }
}
