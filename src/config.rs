//! Configuration for the evaluation sweep.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::configuration::SweepSpace;
use crate::error::{EvalError, Result};
use crate::index::LifecyclePolicy;
use crate::models::Provider;
use crate::poll::{PollPolicy, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// QA backend service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the QA backend (e.g., "http://localhost:8080")
    pub api_base: String,

    /// Whole-request timeout. Completion calls can be slow.
    pub request_timeout_secs: u64,

    pub connect_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            request_timeout_secs: 60,
            connect_timeout_secs: 2,
        }
    }
}

/// Vector database endpoints used for index discovery and readiness probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Controller listing the active indices (GET `{controller_url}/databases`).
    pub controller_url: String,

    /// Per-index host; `{index}` is replaced by the index name.
    pub index_host_template: String,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            controller_url: "https://controller.eu-west4-gcp.pinecone.io".to_string(),
            index_host_template: "https://{index}-63159e9.svc.eu-west4-gcp.pinecone.io"
                .to_string(),
        }
    }
}

/// API keys for the model providers and the vector database.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub open_ai: String,
    pub nlp_cloud: String,
    pub vector_database: String,
}

impl ApiKeys {
    /// Key for a model provider.
    pub fn for_provider(&self, provider: Provider) -> String {
        match provider {
            Provider::OpenAi => self.open_ai.clone(),
            Provider::NlpCloud => self.nlp_cloud.clone(),
        }
    }
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |key: &str| if key.is_empty() { "<unset>" } else { "<set>" };
        f.debug_struct("ApiKeys")
            .field("open_ai", &mask(&self.open_ai))
            .field("nlp_cloud", &mask(&self.nlp_cloud))
            .field("vector_database", &mask(&self.vector_database))
            .finish()
    }
}

/// Delays and budgets for index provisioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Interval between readiness checks while provisioning or deleting an index.
    pub interval_ms: u64,

    /// Interval between checks while clearing stale indices before a run.
    pub cleanup_interval_ms: u64,

    /// Upper bound on readiness checks. Unset means poll until ready.
    pub max_attempts: Option<u32>,

    /// Pause between the liveness probe succeeding and the first upload.
    pub settle_delay_ms: u64,

    pub embedding_retry_delay_ms: u64,

    /// Total upload attempts before provisioning fails.
    pub embedding_max_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            cleanup_interval_ms: 200,
            max_attempts: None,
            settle_delay_ms: 500,
            embedding_retry_delay_ms: 200,
            embedding_max_attempts: 10,
        }
    }
}

impl PollingConfig {
    pub fn lifecycle_policy(&self) -> LifecyclePolicy {
        LifecyclePolicy {
            readiness: PollPolicy {
                interval: Duration::from_millis(self.interval_ms),
                max_attempts: self.max_attempts,
            },
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            embedding_retry: RetryPolicy {
                delay: Duration::from_millis(self.embedding_retry_delay_ms),
                max_attempts: self.embedding_max_attempts,
            },
        }
    }

    pub fn cleanup_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.cleanup_interval_ms),
            max_attempts: self.max_attempts,
        }
    }
}

/// Evaluation behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Prefix of every index name created by the sweep.
    pub index_prefix: String,

    /// Log the question, answer, references and retrieved chunks of every miss.
    pub log_misses: bool,

    /// Chunks retrieved for a miss diagnostic.
    pub miss_context_k: u32,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            index_prefix: "squad".to_string(),
            log_misses: false,
            miss_context_k: 5,
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub vector_db: VectorDbConfig,
    pub keys: ApiKeys,
    pub polling: PollingConfig,
    pub evaluation: EvaluationConfig,
    pub sweep: SweepSpace,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (QA_BACKEND_URL, OPENAI_API_KEY, NLPCLOUD_API_KEY,
    ///    PINECONE_API_KEY, PINECONE_CONTROLLER_URL, PINECONE_INDEX_HOST)
    /// 2. Config file (`path`, or ~/.config/rag-sweep/config.yaml)
    /// 3. Default values
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::config_file_path() {
                Some(default_path) if default_path.exists() => {
                    Self::load_from_file(&default_path)?
                }
                _ => Config::default(),
            },
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;

        serde_yaml::from_str(&content)
            .map_err(|e| EvalError::Config(format!("Failed to parse config file: {}", e)))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(api_base) = env::var("QA_BACKEND_URL") {
            self.backend.api_base = api_base;
        }

        if let Ok(key) = env::var("OPENAI_API_KEY") {
            self.keys.open_ai = key;
        }

        if let Ok(key) = env::var("NLPCLOUD_API_KEY") {
            self.keys.nlp_cloud = key;
        }

        if let Ok(key) = env::var("PINECONE_API_KEY") {
            self.keys.vector_database = key;
        }

        if let Ok(url) = env::var("PINECONE_CONTROLLER_URL") {
            self.vector_db.controller_url = url;
        }

        if let Ok(template) = env::var("PINECONE_INDEX_HOST") {
            self.vector_db.index_host_template = template;
        }
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rag-sweep")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate everything an evaluation run needs.
    pub fn validate(&self) -> Result<()> {
        self.validate_connection()?;

        if self.sweep_uses(Provider::OpenAi) && self.keys.open_ai.is_empty() {
            return Err(EvalError::Config(
                "OpenAI API key is required by the sweep. Set OPENAI_API_KEY environment variable or add to config file.".to_string()
            ));
        }

        if self.sweep_uses(Provider::NlpCloud) && self.keys.nlp_cloud.is_empty() {
            return Err(EvalError::Config(
                "NLP Cloud API key is required by the sweep. Set NLPCLOUD_API_KEY environment variable or add to config file.".to_string()
            ));
        }

        if self.polling.embedding_max_attempts == 0 {
            return Err(EvalError::Config(
                "polling.embedding_max_attempts must be at least 1".to_string(),
            ));
        }

        self.sweep.validate()
    }

    /// Validate the settings needed to reach the backend and the vector database.
    pub fn validate_connection(&self) -> Result<()> {
        if self.backend.api_base.is_empty() {
            return Err(EvalError::Config(
                "QA backend URL is required. Set QA_BACKEND_URL environment variable or add to config file.".to_string()
            ));
        }

        if self.keys.vector_database.is_empty() {
            return Err(EvalError::Config(
                "Vector database API key is required. Set PINECONE_API_KEY environment variable or add to config file.".to_string()
            ));
        }

        if !self.vector_db.index_host_template.contains("{index}") {
            return Err(EvalError::Config(
                "vector_db.index_host_template must contain an {index} placeholder".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether any swept embedding or completion model is served by `provider`.
    fn sweep_uses(&self, provider: Provider) -> bool {
        self.sweep
            .embedding_models
            .iter()
            .map(|m| m.provider())
            .chain(self.sweep.completion_models.iter().map(|m| m.provider()))
            .any(|p| p == provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompletionModel, EmbeddingModel};
    use tempfile::TempDir;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.backend.api_base = "http://localhost:8080".to_string();
        config.keys = ApiKeys {
            open_ai: "sk-test".to_string(),
            nlp_cloud: "nlp-test".to_string(),
            vector_database: "pc-test".to_string(),
        };
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.backend.api_base.is_empty());
        assert_eq!(config.polling.interval_ms, 500);
        assert_eq!(config.polling.embedding_max_attempts, 10);
        assert_eq!(config.polling.max_attempts, None);
        assert_eq!(config.evaluation.index_prefix, "squad");
        assert_eq!(config.sweep, SweepSpace::default());
    }

    #[test]
    fn test_validate_fails_without_required_fields() {
        let config = Config::default();
        assert!(config.validate().is_err());
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_only_requires_used_provider_keys() {
        let mut config = valid_config();
        config.keys.nlp_cloud.clear();
        assert!(config.validate().is_err());
        assert!(config.validate_connection().is_ok());

        config.sweep.embedding_models = vec![EmbeddingModel::OpenAi];
        config.sweep.completion_models = vec![CompletionModel::OpenAi];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_yaml_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
backend:
  api_base: http://qa.internal:9000
polling:
  interval_ms: 50
  max_attempts: 20
sweep:
  embedding_models: [open-ai]
  knn_algorithms: [cosine, dot-product]
  chunk_geometries:
    - { size: 12, overlap: 4 }
  k_values: [2]
"#,
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.backend.api_base, "http://qa.internal:9000");
        assert_eq!(config.backend.request_timeout_secs, 60);
        assert_eq!(config.polling.interval_ms, 50);
        assert_eq!(config.polling.cleanup_interval_ms, 200);
        assert_eq!(config.sweep.embedding_models, vec![EmbeddingModel::OpenAi]);
        assert_eq!(config.sweep.completion_models.len(), 2);
        assert_eq!(config.sweep.k_values, vec![2]);

        let policy = config.polling.lifecycle_policy();
        assert_eq!(policy.readiness.max_attempts, Some(20));
        assert_eq!(policy.readiness.interval, Duration::from_millis(50));
    }

    #[test]
    fn test_api_keys_debug_is_masked() {
        let rendered = format!("{:?}", valid_config().keys);
        assert!(!rendered.contains("sk-test"));
        assert!(rendered.contains("<set>"));
    }
}
