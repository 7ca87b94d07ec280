//! HTTP client for a remote vector index service
//!
//! Speaks a small JSON protocol against any OpenAPI-style vector service:
//! records live under `/namespaces/{ns}/vectors`, searches go to
//! `/namespaces/{ns}/search`. Requires the `remote-index` feature.

use async_trait::async_trait;
use serde::Deserialize;

use super::{IndexMatch, IndexRecord, VectorIndex};
use crate::error::{PraxisError, Result};

/// Remote vector index client
pub struct HttpVectorIndex {
    client: reqwest::Client,
    base_url: String,
    namespace: String,
}

impl HttpVectorIndex {
    /// Create a client for the service at `base_url`, scoped to `namespace`
    pub fn new(base_url: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            namespace: namespace.into(),
        }
    }

    /// Namespace this client is scoped to
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/namespaces/{}/{}",
            self.base_url, self.namespace, path
        )
    }

    async fn check_status(response: reqwest::Response, op: &str) -> Result<reqwest::Response> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PraxisError::Index(format!(
                "vector index {} failed with {}: {}",
                op, status, body
            )));
        }
        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    matches: Vec<IndexMatch>,
}

#[async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn initialize(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Self::check_status(response, "initialize").await?;
        Ok(())
    }

    async fn store(&self, id: &str, record: IndexRecord) -> Result<()> {
        let response = self
            .client
            .post(self.url("vectors"))
            .json(&serde_json::json!({
                "id": id,
                "content": record.content,
                "embedding": record.embedding,
                "metadata": record.metadata,
            }))
            .send()
            .await?;
        Self::check_status(response, "store").await?;
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<IndexMatch>> {
        let response = self
            .client
            .post(self.url("search"))
            .json(&serde_json::json!({
                "embedding": query,
                "k": k,
            }))
            .send()
            .await?;
        let response = Self::check_status(response, "search").await?;
        let body: SearchResponse = response.json().await?;
        Ok(body.matches)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("vectors/{}", id)))
            .send()
            .await?;
        Self::check_status(response, "delete").await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // Plain HTTP, nothing to tear down
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }
}
