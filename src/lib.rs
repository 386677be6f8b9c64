//! RAG Sweep - benchmark a retrieval-augmented QA pipeline against SQuAD.
//!
//! The crate drives a QA backend through every combination of embedding
//! model, completion model, KNN algorithm, chunk model, chunk geometry and
//! retrieval depth `k`, scores each answer against the dataset's references
//! and reports wins and misses per configuration.
//!
//! # Overview
//!
//! For every paragraph of the dataset:
//! 1. A vector index is provisioned and filled with the paragraph's context
//! 2. Every question is asked under every configuration the index serves
//! 3. Answers are judged with a loose, normalized containment rule
//! 4. The index is torn down before the next one is created
//!
//! # Quick Start
//!
//! ```no_run
//! use rag_sweep::{
//!     config::Config,
//!     backend::HttpBackend,
//!     dataset::load_squad_dataset,
//!     orchestrator::EvaluationOrchestrator,
//!     poll::TokioClock,
//! };
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load configuration
//!     let config = Config::load(None)?;
//!     config.validate()?;
//!
//!     // Create the backend client
//!     let backend = HttpBackend::new(&config.backend, &config.vector_db, config.keys.vector_database.clone())?;
//!
//!     // Load a dataset
//!     let dataset = load_squad_dataset(Path::new("dev-v2.0.json"))?;
//!
//!     // Sweep every configuration
//!     let orchestrator = EvaluationOrchestrator::new(&backend, &TokioClock, &config);
//!     let report = orchestrator.run_evaluation(&dataset).await?;
//!
//!     print!("{}", report.to_csv());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **QaBackend**: the chunking, embedding, storage and generation service
//! - **IndexLifecycleManager**: provisions and tears down indices, polling for readiness
//! - **ConfigurationSweeper**: evaluates every configuration on one paragraph
//! - **AnswerJudge**: decides win or miss for one answer
//! - **ReportAggregator**: folds score records into the per-configuration report

pub mod backend;
pub mod config;
pub mod configuration;
pub mod dataset;
pub mod error;
pub mod index;
pub mod judge;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod poll;
pub mod report;
pub mod score;
pub mod sweep;

// Re-export commonly used types
pub use backend::{BackendSettings, HttpBackend, QaBackend};
pub use config::Config;
pub use configuration::{ConfigurationTuple, SweepSpace, enumerate_configurations};
pub use dataset::{Dataset, QuestionAnswer};
pub use error::{EvalError, Result};
pub use judge::{AnswerJudge, Verdict};
pub use orchestrator::{EvaluationOrchestrator, EvaluationRun};
pub use report::{EvaluationReport, ReportRow};
pub use score::ScoreRecord;
