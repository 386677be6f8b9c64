//! The QA backend collaborator.
//!
//! The backend owns chunking, embedding, vector storage and generation. The
//! sweep only drives it through [`QaBackend`], passing an immutable
//! [`BackendSettings`] with every call instead of mutating shared state.

mod http;

#[cfg(test)]
pub(crate) mod fake;

pub use http::HttpBackend;

use crate::config::ApiKeys;
use crate::configuration::ConfigurationTuple;
use crate::error::Result;
use crate::models::{ChunkModel, CompletionModel, EmbeddingModel, KnnAlgorithm};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Everything the backend needs to know about the configuration under test.
#[derive(Clone, PartialEq, Serialize)]
pub struct BackendSettings {
    pub embedding_model: EmbeddingModel,
    pub embedding_api_key: String,
    pub completion_model: CompletionModel,
    pub completion_api_key: String,
    pub vector_database_api_key: String,
    pub knn_algorithm: KnnAlgorithm,
    pub chunk_model: ChunkModel,
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub k: u32,
}

impl BackendSettings {
    /// Settings for one configuration, routing each model to its provider's key.
    pub fn for_configuration(configuration: &ConfigurationTuple, keys: &ApiKeys) -> Self {
        Self {
            embedding_model: configuration.embedding_model,
            embedding_api_key: keys.for_provider(configuration.embedding_model.provider()),
            completion_model: configuration.completion_model,
            completion_api_key: keys.for_provider(configuration.completion_model.provider()),
            vector_database_api_key: keys.vector_database.clone(),
            knn_algorithm: configuration.knn_algorithm,
            chunk_model: configuration.chunk_model,
            chunk_size: configuration.chunk_size,
            chunk_overlap: configuration.chunk_overlap,
            k: configuration.k,
        }
    }
}

// Keys stay out of logs.
impl fmt::Debug for BackendSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSettings")
            .field("embedding_model", &self.embedding_model)
            .field("completion_model", &self.completion_model)
            .field("knn_algorithm", &self.knn_algorithm)
            .field("chunk_model", &self.chunk_model)
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("k", &self.k)
            .finish_non_exhaustive()
    }
}

/// A chunk returned by a nearest-neighbor lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// The stored chunk text.
    #[serde(alias = "index")]
    pub text: String,
    #[serde(default)]
    pub score: Option<f32>,
}

/// Operations the evaluation needs from the QA backend and its vector database.
#[async_trait]
pub trait QaBackend: Send + Sync {
    /// Ask the backend to create an empty index.
    async fn create_database(&self, index_name: &str, settings: &BackendSettings) -> Result<()>;

    /// Delete an index and everything stored in it.
    async fn delete_all_embeddings(&self, index_name: &str) -> Result<()>;

    /// Names of every index the vector database currently reports.
    async fn list_active_index_names(&self) -> Result<BTreeSet<String>>;

    /// Chunk, embed and store `text`. May fail transiently.
    async fn create_embeddings(
        &self,
        index_name: &str,
        text: &str,
        settings: &BackendSettings,
    ) -> Result<()>;

    /// Retrieve `settings.k` chunks and generate an answer, or the refusal sentence.
    async fn query(
        &self,
        index_name: &str,
        question: &str,
        settings: &BackendSettings,
    ) -> Result<String>;

    /// The `k` chunks closest to `query`, nearest first.
    async fn find_k_nearest(
        &self,
        index_name: &str,
        query: &str,
        k: u32,
        settings: &BackendSettings,
    ) -> Result<Vec<RetrievedChunk>>;

    /// Liveness probe. Any success means the index accepts requests.
    async fn describe_index_stats(&self, index_name: &str) -> Result<()>;

    /// Query with an all-zero vector of `dimension` entries and return the
    /// number of matches. Non-zero once submitted vectors are searchable.
    async fn query_zero_vector(&self, index_name: &str, dimension: usize) -> Result<usize>;
}
