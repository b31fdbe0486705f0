//! Collaborator trait definitions.
//!
//! The document database is external: `psytest-store` implements
//! [`DocumentStore`] for concrete backends, and
//! [`crate::repository::DocumentRepository`] layers the typed
//! [`QuestionPool`] and [`ResultStore`] views on top of any of them.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::model::{Block, Question, QuestionStatus, TestDefinition};
use crate::results::TestResult;

/// Logical collection names used by the engine.
pub mod collections {
    pub const QUESTIONS: &str = "questions";
    pub const BLOCKS: &str = "blocks";
    pub const TESTS: &str = "tests";
    pub const TEST_RESULTS: &str = "test-results";
}

// ---------------------------------------------------------------------------
// Document store
// ---------------------------------------------------------------------------

/// A schemaless document with a store-assigned identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Equality filter on a top-level document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    /// Match documents whose `field` equals `value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether `data` satisfies this filter.
    pub fn matches(&self, data: &Value) -> bool {
        data.get(&self.field) == Some(&self.value)
    }

    /// Render the filter value as a query-string value.
    pub fn value_as_query(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Trait for document database backends.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Human-readable backend name (e.g. "file").
    fn name(&self) -> &str;

    /// Fetch every document in `collection` matching all `filters`.
    async fn fetch(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Document>>;

    /// Fetch one document by id.
    async fn get(&self, collection: &str, id: &str) -> Result<Document>;

    /// Create a document and return its id. When `id` is `None` the store
    /// assigns one; an explicit id that already exists is a validation error.
    async fn create(&self, collection: &str, id: Option<&str>, data: Value) -> Result<String>;

    /// Replace the data of an existing document.
    async fn update(&self, collection: &str, id: &str, data: Value) -> Result<()>;

    /// Delete a document.
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn fetch(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Document>> {
        (**self).fetch(collection, filters).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Document> {
        (**self).get(collection, id).await
    }

    async fn create(&self, collection: &str, id: Option<&str>, data: Value) -> Result<String> {
        (**self).create(collection, id, data).await
    }

    async fn update(&self, collection: &str, id: &str, data: Value) -> Result<()> {
        (**self).update(collection, id, data).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        (**self).delete(collection, id).await
    }
}

// ---------------------------------------------------------------------------
// Typed views
// ---------------------------------------------------------------------------

/// Selects questions for a block's pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionFilter {
    pub category: String,
    pub status: Option<QuestionStatus>,
}

impl QuestionFilter {
    /// Active questions of `category`, the pool the sampler draws from.
    pub fn active(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            status: Some(QuestionStatus::Active),
        }
    }
}

/// Source of tests, blocks and question pools.
#[async_trait]
pub trait QuestionPool: Send + Sync {
    async fn fetch_test(&self, id: &str) -> Result<TestDefinition>;

    async fn fetch_block(&self, id: &str) -> Result<Block>;

    async fn fetch_questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>>;
}

/// Persistence of finished attempts.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Write a new result. Results are never updated afterwards.
    async fn create_result(&self, result: &TestResult) -> Result<String>;

    /// All results owned by `user_id`, oldest first.
    async fn fetch_results(&self, user_id: &str) -> Result<Vec<TestResult>>;

    async fn fetch_result(&self, id: &str) -> Result<TestResult>;

    async fn delete_result(&self, id: &str) -> Result<()>;
}
