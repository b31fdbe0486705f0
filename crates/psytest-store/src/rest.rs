//! REST document API backend.
//!
//! Endpoints, relative to the base URL:
//!
//! | operation | request                                   |
//! |-----------|-------------------------------------------|
//! | fetch     | `GET /v1/{collection}?field=value&...`    |
//! | get       | `GET /v1/{collection}/{id}`               |
//! | create    | `POST /v1/{collection}` `{ id?, data }`   |
//! | update    | `PATCH /v1/{collection}/{id}` `{ data }`  |
//! | delete    | `DELETE /v1/{collection}/{id}`            |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, Url};
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use psytest_core::traits::{Document, DocumentStore, Filter};
use psytest_core::Result;

use crate::error::StoreError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Document store reached over HTTP.
pub struct RestStore {
    base_url: String,
    api_key: Option<String>,
    timeout_secs: u64,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct CreateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    data: Value,
}

#[derive(Serialize)]
struct UpdateBody {
    data: Value,
}

impl RestStore {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> std::result::Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StoreError::NetworkError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout_secs,
            client,
        })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/v1/{collection}", self.base_url)
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/v1/{collection}/{id}", self.base_url)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn send(
        &self,
        req: reqwest::RequestBuilder,
        collection: &str,
        id: Option<&str>,
    ) -> std::result::Result<Response, StoreError> {
        let response = self.authorize(req).send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Timeout(self.timeout_secs)
            } else {
                StoreError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        match status {
            401 | 403 => {
                let body = response.text().await.unwrap_or_default();
                Err(StoreError::AuthenticationFailed(body))
            }
            404 => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.unwrap_or_default().to_string(),
            }),
            409 => Err(StoreError::Duplicate {
                collection: collection.to_string(),
                id: id.unwrap_or_default().to_string(),
            }),
            s if s >= 400 => {
                let body = response.text().await.unwrap_or_default();
                Err(StoreError::ApiError {
                    status,
                    message: body,
                })
            }
            _ => Ok(response),
        }
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: Response,
    ) -> std::result::Result<T, StoreError> {
        response.json().await.map_err(|e| StoreError::ApiError {
            status: 0,
            message: format!("failed to parse response: {e}"),
        })
    }
}

#[async_trait]
impl DocumentStore for RestStore {
    fn name(&self) -> &str {
        "rest"
    }

    #[instrument(skip(self, filters), fields(filters = filters.len()))]
    async fn fetch(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Document>> {
        let params: Vec<(String, String)> = filters
            .iter()
            .map(|f| (f.field.clone(), f.value_as_query()))
            .collect();
        let url = Url::parse_with_params(&self.collection_url(collection), &params)
            .map_err(|e| StoreError::NetworkError(format!("invalid URL: {e}")))?;

        let response = self.send(self.client.get(url), collection, None).await?;
        Ok(Self::parse(response).await?)
    }

    #[instrument(skip(self))]
    async fn get(&self, collection: &str, id: &str) -> Result<Document> {
        let req = self.client.get(self.document_url(collection, id));
        let response = self.send(req, collection, Some(id)).await?;
        Ok(Self::parse(response).await?)
    }

    #[instrument(skip(self, data))]
    async fn create(&self, collection: &str, id: Option<&str>, data: Value) -> Result<String> {
        let req = self
            .client
            .post(self.collection_url(collection))
            .json(&CreateBody { id, data });
        let response = self.send(req, collection, id).await?;
        let doc: Document = Self::parse(response).await?;
        tracing::debug!(collection, id = %doc.id, "document created");
        Ok(doc.id)
    }

    #[instrument(skip(self, data))]
    async fn update(&self, collection: &str, id: &str, data: Value) -> Result<()> {
        let req = self
            .client
            .patch(self.document_url(collection, id))
            .json(&UpdateBody { data });
        self.send(req, collection, Some(id)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let req = self.client.delete(self.document_url(collection, id));
        self.send(req, collection, Some(id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psytest_core::TestError;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn doc(id: &str, data: Value) -> Value {
        json!({
            "id": id,
            "data": data,
            "created_at": "2026-01-10T09:00:00Z",
            "updated_at": "2026-01-10T09:00:00Z"
        })
    }

    fn store(server: &MockServer) -> RestStore {
        RestStore::new(&server.uri(), Some("test-key".into()), 5).unwrap()
    }

    #[tokio::test]
    async fn fetch_sends_filters_as_query() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/questions"))
            .and(query_param("category", "verbal"))
            .and(query_param("status", "active"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([doc("q1", json!({"category": "verbal"}))])),
            )
            .mount(&server)
            .await;

        let docs = store(&server)
            .fetch(
                "questions",
                &[Filter::eq("category", "verbal"), Filter::eq("status", "active")],
            )
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "q1");
    }

    #[tokio::test]
    async fn create_posts_id_and_data() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/test-results"))
            .and(body_json(json!({"id": "r1", "data": {"user_id": "u1"}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(doc("r1", json!({"user_id": "u1"}))))
            .expect(1)
            .mount(&server)
            .await;

        let id = store(&server)
            .create("test-results", Some("r1"), json!({"user_id": "u1"}))
            .await
            .unwrap();
        assert_eq!(id, "r1");
    }

    #[tokio::test]
    async fn update_and_delete() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/v1/tests/t1"))
            .and(body_json(json!({"data": {"name": "Renamed"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(doc("t1", json!({"name": "Renamed"}))))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/tests/t1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let store = store(&server);
        store.update("tests", "t1", json!({"name": "Renamed"})).await.unwrap();
        store.delete("tests", "t1").await.unwrap();
    }

    #[tokio::test]
    async fn status_codes_map_to_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/tests/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/tests/secret"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/tests/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let store = store(&server);
        assert!(matches!(
            store.get("tests", "missing").await,
            Err(TestError::NotFound { .. })
        ));
        assert!(matches!(
            store.get("tests", "secret").await,
            Err(TestError::Unauthorized(_))
        ));
        let err = store.get("tests", "broken").await.unwrap_err();
        assert!(matches!(err, TestError::Network(_)));
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        // nothing listens on the discard port
        let store = RestStore::new("http://127.0.0.1:9", None, 1).unwrap();
        let err = store.fetch("tests", &[]).await.unwrap_err();
        assert!(matches!(err, TestError::Network(_)));
    }
}
