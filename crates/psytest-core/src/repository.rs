//! Typed access to the document store.
//!
//! Documents hold the serialized record without its `id`; the store's
//! document id is injected back when decoding.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, TestError};
use crate::model::{Block, Question, TestDefinition};
use crate::parser::QuestionBank;
use crate::results::TestResult;
use crate::traits::{
    collections, Document, DocumentStore, Filter, QuestionFilter, QuestionPool, ResultStore,
};

/// Counts from [`DocumentRepository::import_bank`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    /// Records refused by validation, with the reason.
    pub rejected: Vec<(String, String)>,
}

/// [`QuestionPool`] and [`ResultStore`] over any [`DocumentStore`].
pub struct DocumentRepository<S> {
    store: S,
}

impl<S: DocumentStore> DocumentRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn create_question(&self, question: &Question) -> Result<String> {
        question.validate()?;
        self.store
            .create(collections::QUESTIONS, Some(&question.id), encode(question)?)
            .await
    }

    pub async fn create_block(&self, block: &Block) -> Result<String> {
        self.store
            .create(collections::BLOCKS, Some(&block.id), encode(block)?)
            .await
    }

    pub async fn create_test(&self, test: &TestDefinition) -> Result<String> {
        test.validate()?;
        self.store
            .create(collections::TESTS, Some(&test.id), encode(test)?)
            .await
    }

    /// Every test in the catalogue.
    pub async fn list_tests(&self) -> Result<Vec<TestDefinition>> {
        self.store
            .fetch(collections::TESTS, &[])
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Create or replace every record of `bank`.
    ///
    /// Invalid questions and tests are rejected individually; store errors
    /// abort the import.
    pub async fn import_bank(&self, bank: &QuestionBank) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();

        for block in &bank.blocks {
            self.upsert(collections::BLOCKS, &block.id, encode(block)?, &mut summary)
                .await?;
        }
        for question in &bank.questions {
            if let Err(e) = question.validate() {
                tracing::warn!(question = %question.id, "rejected: {e}");
                summary.rejected.push((question.id.clone(), e.to_string()));
                continue;
            }
            self.upsert(collections::QUESTIONS, &question.id, encode(question)?, &mut summary)
                .await?;
        }
        for test in &bank.tests {
            if let Err(e) = test.validate() {
                tracing::warn!(test = %test.id, "rejected: {e}");
                summary.rejected.push((test.id.clone(), e.to_string()));
                continue;
            }
            self.upsert(collections::TESTS, &test.id, encode(test)?, &mut summary)
                .await?;
        }

        tracing::info!(
            bank = %bank.id,
            created = summary.created,
            updated = summary.updated,
            rejected = summary.rejected.len(),
            "bank imported"
        );
        Ok(summary)
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        data: Value,
        summary: &mut ImportSummary,
    ) -> Result<()> {
        match self.store.get(collection, id).await {
            Ok(_) => {
                self.store.update(collection, id, data).await?;
                summary.updated += 1;
            }
            Err(TestError::NotFound { .. }) => {
                self.store.create(collection, Some(id), data).await?;
                summary.created += 1;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
}

/// Serialize a record, dropping its `id` field.
fn encode<T: Serialize>(value: &T) -> Result<Value> {
    let mut data = serde_json::to_value(value)?;
    if let Value::Object(map) = &mut data {
        map.remove("id");
    }
    Ok(data)
}

/// Deserialize a document, restoring its `id` field.
fn decode<T: DeserializeOwned>(doc: Document) -> Result<T> {
    let mut data = doc.data;
    match &mut data {
        Value::Object(map) => {
            map.insert("id".into(), Value::String(doc.id));
        }
        _ => {
            return Err(TestError::Validation(format!(
                "document {} is not an object",
                doc.id
            )))
        }
    }
    Ok(serde_json::from_value(data)?)
}

/// Map a store-level not-found onto the record kind the caller asked for.
fn rename_not_found(err: TestError, kind: &'static str) -> TestError {
    match err {
        TestError::NotFound { id, .. } => TestError::NotFound { kind, id },
        other => other,
    }
}

#[async_trait]
impl<S: DocumentStore> QuestionPool for DocumentRepository<S> {
    async fn fetch_test(&self, id: &str) -> Result<TestDefinition> {
        let doc = self
            .store
            .get(collections::TESTS, id)
            .await
            .map_err(|e| rename_not_found(e, "test"))?;
        decode(doc)
    }

    async fn fetch_block(&self, id: &str) -> Result<Block> {
        let doc = self
            .store
            .get(collections::BLOCKS, id)
            .await
            .map_err(|e| rename_not_found(e, "block"))?;
        decode(doc)
    }

    async fn fetch_questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>> {
        let mut filters = vec![Filter::eq("category", filter.category.as_str())];
        if let Some(status) = filter.status {
            filters.push(Filter::eq("status", status.to_string()));
        }
        let docs = self.store.fetch(collections::QUESTIONS, &filters).await?;
        tracing::debug!(category = %filter.category, count = docs.len(), "fetched question pool");
        docs.into_iter().map(decode).collect()
    }
}

#[async_trait]
impl<S: DocumentStore> ResultStore for DocumentRepository<S> {
    async fn create_result(&self, result: &TestResult) -> Result<String> {
        let id = result.id.to_string();
        self.store
            .create(collections::TEST_RESULTS, Some(&id), encode(result)?)
            .await
    }

    async fn fetch_results(&self, user_id: &str) -> Result<Vec<TestResult>> {
        let docs = self
            .store
            .fetch(collections::TEST_RESULTS, &[Filter::eq("user_id", user_id)])
            .await?;
        let mut results = docs
            .into_iter()
            .map(decode)
            .collect::<Result<Vec<TestResult>>>()?;
        results.sort_by_key(|r| r.started_at);
        Ok(results)
    }

    async fn fetch_result(&self, id: &str) -> Result<TestResult> {
        let doc = self
            .store
            .get(collections::TEST_RESULTS, id)
            .await
            .map_err(|e| rename_not_found(e, "result"))?;
        decode(doc)
    }

    async fn delete_result(&self, id: &str) -> Result<()> {
        self.store
            .delete(collections::TEST_RESULTS, id)
            .await
            .map_err(|e| rename_not_found(e, "result"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::tests::{block, question, test_def};
    use crate::model::{QuestionStatus, TestKind, TimingMode};
    use crate::parser::parse_bank_str;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::Mutex;

    /// Minimal in-process store for exercising the repository.
    #[derive(Default)]
    struct MapStore {
        docs: Mutex<BTreeMap<(String, String), Value>>,
    }

    #[async_trait]
    impl DocumentStore for MapStore {
        fn name(&self) -> &str {
            "map"
        }

        async fn fetch(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Document>> {
            let now = Utc::now();
            Ok(self
                .docs
                .lock()
                .unwrap()
                .iter()
                .filter(|((c, _), data)| c == collection && filters.iter().all(|f| f.matches(data)))
                .map(|((_, id), data)| Document {
                    id: id.clone(),
                    data: data.clone(),
                    created_at: now,
                    updated_at: now,
                })
                .collect())
        }

        async fn get(&self, collection: &str, id: &str) -> Result<Document> {
            let now = Utc::now();
            self.docs
                .lock()
                .unwrap()
                .get(&(collection.to_string(), id.to_string()))
                .map(|data| Document {
                    id: id.into(),
                    data: data.clone(),
                    created_at: now,
                    updated_at: now,
                })
                .ok_or_else(|| TestError::not_found("document", id))
        }

        async fn create(&self, collection: &str, id: Option<&str>, data: Value) -> Result<String> {
            let id = id.map(String::from).unwrap_or_else(|| "generated".into());
            let key = (collection.to_string(), id.clone());
            let mut docs = self.docs.lock().unwrap();
            if docs.contains_key(&key) {
                return Err(TestError::Validation(format!("duplicate id {id}")));
            }
            docs.insert(key, data);
            Ok(id)
        }

        async fn update(&self, collection: &str, id: &str, data: Value) -> Result<()> {
            let key = (collection.to_string(), id.to_string());
            match self.docs.lock().unwrap().get_mut(&key) {
                Some(slot) => {
                    *slot = data;
                    Ok(())
                }
                None => Err(TestError::not_found("document", id)),
            }
        }

        async fn delete(&self, collection: &str, id: &str) -> Result<()> {
            self.docs
                .lock()
                .unwrap()
                .remove(&(collection.to_string(), id.to_string()))
                .map(|_| ())
                .ok_or_else(|| TestError::not_found("document", id))
        }
    }

    #[tokio::test]
    async fn documents_round_trip_without_stored_id() {
        let repo = DocumentRepository::new(MapStore::default());
        repo.create_block(&block("verbal", 3, Some(60))).await.unwrap();

        let stored = repo.store().get(collections::BLOCKS, "verbal").await.unwrap();
        assert!(stored.data.get("id").is_none());

        let fetched = repo.fetch_block("verbal").await.unwrap();
        assert_eq!(fetched, block("verbal", 3, Some(60)));
    }

    #[tokio::test]
    async fn invalid_question_never_stored() {
        let repo = DocumentRepository::new(MapStore::default());
        let err = repo.create_question(&question("q1", "verbal", 8)).await.unwrap_err();
        assert!(matches!(err, TestError::Validation(_)));
        assert!(repo.store().fetch(collections::QUESTIONS, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pool_filters_category_and_status() {
        let repo = DocumentRepository::new(MapStore::default());
        repo.create_question(&question("v1", "verbal", 0)).await.unwrap();
        repo.create_question(&question("n1", "numeric", 0)).await.unwrap();
        let mut draft = question("v2", "verbal", 0);
        draft.status = QuestionStatus::Draft;
        repo.create_question(&draft).await.unwrap();

        let pool = repo.fetch_questions(&QuestionFilter::active("verbal")).await.unwrap();
        let ids: Vec<&str> = pool.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["v1"]);
    }

    #[tokio::test]
    async fn not_found_names_record_kind() {
        let repo = DocumentRepository::new(MapStore::default());
        let err = repo.fetch_test("ghost").await.unwrap_err();
        assert_eq!(err.to_string(), "test not found: ghost");
        let err = repo.delete_result("ghost").await.unwrap_err();
        assert_eq!(err.to_string(), "result not found: ghost");
    }

    #[tokio::test]
    async fn results_listed_oldest_first_per_user() {
        use crate::results::{FinishReason, ScoreSheet};
        use chrono::Duration;

        let repo = DocumentRepository::new(MapStore::default());
        let sheet = ScoreSheet {
            test_id: "t1".into(),
            blocks: vec![],
            total_correct: 0,
            total_questions: 0,
            aggregate_score: 0.0,
            scoring: Default::default(),
            integrity_warnings: vec![],
        };
        let base = Utc::now();
        let make = |user: &str, offset: i64| {
            let at = base + Duration::seconds(offset);
            TestResult::from_sheet(sheet.clone(), user, BTreeMap::new(), FinishReason::Completed, at, at)
        };

        let late = make("u1", 60);
        let early = make("u1", 0);
        let other = make("u2", 30);
        for r in [&late, &early, &other] {
            repo.create_result(r).await.unwrap();
        }

        let listed = repo.fetch_results("u1").await.unwrap();
        assert_eq!(listed, vec![early.clone(), late]);
        assert_eq!(repo.fetch_result(&early.id.to_string()).await.unwrap(), early);

        repo.delete_result(&other.id.to_string()).await.unwrap();
        assert!(repo.fetch_results("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn import_creates_then_updates() {
        let toml = r#"
[bank]
id = "b"
name = "B"

[[blocks]]
id = "verbal"
category = "verbal"
name = "Verbal"
default_quantity = 1

[[questions]]
id = "v1"
category = "verbal"
prompt = "?"
format = "text"
options = ["a", "b"]
correct_answer = 1

[[questions]]
id = "bad"
category = "verbal"
prompt = "?"
format = "text"
options = ["a", "b"]
correct_answer = 2

[[tests]]
id = "t1"
name = "T"

[[tests.blocks]]
block = "verbal"
"#;
        let bank = parse_bank_str(toml, Path::new("b.toml")).unwrap();
        let repo = DocumentRepository::new(MapStore::default());

        let first = repo.import_bank(&bank).await.unwrap();
        assert_eq!(first.created, 3);
        assert_eq!(first.updated, 0);
        assert_eq!(first.rejected.len(), 1);
        assert_eq!(first.rejected[0].0, "bad");

        let second = repo.import_bank(&bank).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 3);

        let tests = repo.list_tests().await.unwrap();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0], {
            let mut t = test_def(TestKind::Structured, TimingMode::PerBlock, &["verbal"]);
            t.name = "T".into();
            t
        });
    }
}
