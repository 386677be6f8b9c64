//! HTTP implementation of the QA backend.
//!
//! Index creation, uploads and queries go to the QA backend service; index
//! discovery and the readiness probes go straight to the vector database,
//! authenticated with its `Api-Key` header.

use super::{BackendSettings, QaBackend, RetrievedChunk};
use crate::config::{BackendConfig, VectorDbConfig};
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct CreateDatabaseRequest<'a> {
    index_name: &'a str,
    settings: &'a BackendSettings,
}

#[derive(Debug, Serialize)]
struct CreateEmbeddingsRequest<'a> {
    index_name: &'a str,
    input: &'a str,
    settings: &'a BackendSettings,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    index_name: &'a str,
    query: &'a str,
    settings: &'a BackendSettings,
}

#[derive(Debug, Serialize)]
struct NearestRequest<'a> {
    index_name: &'a str,
    query: &'a str,
    k: u32,
    settings: &'a BackendSettings,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VectorQueryRequest {
    vector: Vec<f32>,
    top_k: u32,
}

#[derive(Debug, Deserialize)]
struct VectorQueryResponse {
    #[serde(default)]
    matches: Vec<serde_json::Value>,
}

/// Error body returned by either service.
#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(alias = "error")]
    message: String,
}

/// QA backend reached over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    api_base: String,
    controller_url: String,
    index_host_template: String,
    vector_database_api_key: String,
}

impl HttpBackend {
    /// Create a backend client from configuration.
    pub fn new(
        backend: &BackendConfig,
        vector_db: &VectorDbConfig,
        vector_database_api_key: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(backend.connect_timeout_secs))
            .timeout(Duration::from_secs(backend.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_base: backend.api_base.trim_end_matches('/').to_string(),
            controller_url: vector_db.controller_url.trim_end_matches('/').to_string(),
            index_host_template: vector_db.index_host_template.clone(),
            vector_database_api_key: vector_database_api_key.into(),
        })
    }

    fn backend_url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    fn index_url(&self, index_name: &str, path: &str) -> String {
        let host = self.index_host_template.replace("{index}", index_name);
        format!("{}/{}", host.trim_end_matches('/'), path)
    }

    fn vector_db(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Api-Key", &self.vector_database_api_key)
            .header("accept", "application/json")
    }

    /// Turn a non-success status into an error, keeping the service's message if it sent one.
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await?;
        if let Ok(api_error) = serde_json::from_str::<ApiError>(&body) {
            return Err(EvalError::Backend(format!(
                "API error ({}): {}",
                status, api_error.message
            )));
        }
        Err(EvalError::Backend(format!(
            "Request failed ({}): {}",
            status, body
        )))
    }
}

#[async_trait]
impl QaBackend for HttpBackend {
    async fn create_database(&self, index_name: &str, settings: &BackendSettings) -> Result<()> {
        let request = CreateDatabaseRequest {
            index_name,
            settings,
        };
        let response = self
            .client
            .post(self.backend_url("databases"))
            .json(&request)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete_all_embeddings(&self, index_name: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.backend_url(&format!("databases/{}", index_name)))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn list_active_index_names(&self) -> Result<BTreeSet<String>> {
        let response = self
            .vector_db(self.client.get(format!("{}/databases", self.controller_url)))
            .send()
            .await?;
        let body = Self::check(response).await?.text().await?;

        // The controller answers with a bare JSON array, or nothing at all.
        if body.trim().is_empty() || body.trim() == "null" {
            return Ok(BTreeSet::new());
        }
        let names: Vec<String> = serde_json::from_str(&body)?;
        Ok(names.into_iter().collect())
    }

    async fn create_embeddings(
        &self,
        index_name: &str,
        text: &str,
        settings: &BackendSettings,
    ) -> Result<()> {
        let request = CreateEmbeddingsRequest {
            index_name,
            input: text,
            settings,
        };
        let response = self
            .client
            .post(self.backend_url("embeddings"))
            .json(&request)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn query(
        &self,
        index_name: &str,
        question: &str,
        settings: &BackendSettings,
    ) -> Result<String> {
        let request = QueryRequest {
            index_name,
            query: question,
            settings,
        };
        let response = self
            .client
            .post(self.backend_url("query"))
            .json(&request)
            .send()
            .await?;
        let answer = Self::check(response).await?.text().await?;
        Ok(answer.trim().to_string())
    }

    async fn find_k_nearest(
        &self,
        index_name: &str,
        query: &str,
        k: u32,
        settings: &BackendSettings,
    ) -> Result<Vec<RetrievedChunk>> {
        let request = NearestRequest {
            index_name,
            query,
            k,
            settings,
        };
        let response = self
            .client
            .post(self.backend_url("nearest"))
            .json(&request)
            .send()
            .await?;
        let chunks = Self::check(response).await?.json().await?;
        Ok(chunks)
    }

    async fn describe_index_stats(&self, index_name: &str) -> Result<()> {
        let response = self
            .vector_db(
                self.client
                    .post(self.index_url(index_name, "describe_index_stats")),
            )
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn query_zero_vector(&self, index_name: &str, dimension: usize) -> Result<usize> {
        let request = VectorQueryRequest {
            vector: vec![0.0; dimension],
            top_k: 1,
        };
        let response = self
            .vector_db(self.client.post(self.index_url(index_name, "query")))
            .json(&request)
            .send()
            .await?;
        let result: VectorQueryResponse = Self::check(response).await?.json().await?;
        Ok(result.matches.len())
    }
}
