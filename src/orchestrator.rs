//! Top-level evaluation run: stale cleanup, sweep, aggregation.

use crate::backend::QaBackend;
use crate::config::Config;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::index::IndexLifecycleManager;
use crate::poll::Clock;
use crate::report::{EvaluationReport, ReportAggregator};
use crate::score::ScoreRecord;
use crate::sweep::{ConfigurationSweeper, SweepOptions};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRun {
    pub report: EvaluationReport,
    /// Raw per-paragraph tallies the report was folded from.
    pub records: Vec<ScoreRecord>,
    /// Stale indices removed before the sweep.
    pub cleared_indices: Vec<String>,
    pub total_time_secs: f64,
}

/// Coordinates one evaluation run against a [`QaBackend`].
pub struct EvaluationOrchestrator<'a> {
    backend: &'a dyn QaBackend,
    clock: &'a dyn Clock,
    config: &'a Config,
}

impl<'a> EvaluationOrchestrator<'a> {
    pub fn new(backend: &'a dyn QaBackend, clock: &'a dyn Clock, config: &'a Config) -> Self {
        Self {
            backend,
            clock,
            config,
        }
    }

    fn manager(&self) -> IndexLifecycleManager<'a> {
        IndexLifecycleManager::new(self.backend, self.clock, self.config.polling.lifecycle_policy())
    }

    /// Delete every index left over from earlier runs. Never fails.
    pub async fn clear_stale_indices(&self) -> Vec<String> {
        self.manager()
            .clear_stale_indices(self.config.polling.cleanup_policy())
            .await
    }

    /// Run the sweep over `dataset` and return the aggregated report.
    pub async fn run_evaluation(&self, dataset: &Dataset) -> Result<EvaluationReport> {
        Ok(self.run(dataset).await?.report)
    }

    /// Run the sweep over `dataset`, keeping the raw records as well.
    ///
    /// Any error aborts the run and no partial report is produced.
    pub async fn run(&self, dataset: &Dataset) -> Result<EvaluationRun> {
        let start = Instant::now();
        let cleared_indices = self.clear_stale_indices().await;

        let options = SweepOptions {
            log_misses: self.config.evaluation.log_misses,
            miss_context_k: self.config.evaluation.miss_context_k,
        };
        let sweeper = ConfigurationSweeper::new(
            self.backend,
            self.manager(),
            &self.config.keys,
            &self.config.sweep,
            &self.config.evaluation.index_prefix,
            options,
        );

        let paragraph_count = dataset.paragraph_count();
        if paragraph_count == 0 {
            warn!(dataset = %dataset.name, "Dataset has no paragraphs");
        }
        info!(
            dataset = %dataset.name,
            paragraphs = paragraph_count,
            questions = dataset.question_count(),
            indices_per_paragraph = sweeper.plans().len(),
            "Starting sweep"
        );

        let mut records = Vec::new();
        for (idx, paragraph) in dataset.paragraphs().enumerate() {
            info!(
                "[{}/{}] Evaluating paragraph ({} questions)",
                idx + 1,
                paragraph_count,
                paragraph.questions.len()
            );
            records.extend(sweeper.evaluate_paragraph(paragraph).await?);
        }

        let rows = ReportAggregator::new(&self.config.sweep).aggregate(&records);
        let report = EvaluationReport {
            dataset_name: dataset.name.clone(),
            paragraphs: paragraph_count,
            questions: dataset.question_count(),
            rows,
        };

        let total_time_secs = start.elapsed().as_secs_f64();
        info!(
            records = records.len(),
            rows = report.rows.len(),
            "Sweep finished in {:.1}s",
            total_time_secs
        );

        Ok(EvaluationRun {
            report,
            records,
            cleared_indices,
            total_time_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::{Call, FakeBackend};
    use crate::dataset::create_sample_dataset;
    use crate::error::EvalError;
    use crate::models::{ChunkModel, CompletionModel, EmbeddingModel, KnnAlgorithm};
    use crate::poll::ManualClock;

    fn small_config() -> Config {
        let mut config = Config::default();
        config.sweep.embedding_models = vec![EmbeddingModel::OpenAi];
        config.sweep.completion_models = vec![CompletionModel::OpenAi];
        config.sweep.knn_algorithms = vec![KnnAlgorithm::Cosine];
        config.sweep.chunk_models = vec![ChunkModel::Sentences, ChunkModel::Arbitrary];
        config.sweep.k_values = vec![1, 3];
        config
    }

    fn backend() -> FakeBackend {
        FakeBackend::new()
            .with_listing_lag(1)
            .answer("Which NFL team won Super Bowl 50?", "The Denver Broncos won.")
            .answer("Where was Super Bowl 50 played?", "In Miami")
            .answer("In what country is Normandy located?", "France")
            .answer("Who was the leader of the Norse raiders?", "Rollo")
    }

    #[tokio::test]
    async fn test_run_produces_one_row_per_configuration() {
        let backend = backend();
        let clock = ManualClock::new();
        let config = small_config();
        let dataset = create_sample_dataset();

        let run = EvaluationOrchestrator::new(&backend, &clock, &config)
            .run(&dataset)
            .await
            .unwrap();

        // sentences: 2 k values; arbitrary: 3 geometries * 2 k values
        assert_eq!(run.report.rows.len(), 2 + 3 * 2);
        assert_eq!(run.records.len(), run.report.rows.len() * dataset.paragraph_count());
        for row in &run.report.rows {
            // 5 questions: only "Where was Super Bowl 50 played?" misses
            assert_eq!((row.wins, row.misses), (4, 1));
        }
        assert!(backend.live_indices().is_empty());
    }

    #[tokio::test]
    async fn test_at_most_one_index_is_live() {
        let backend = backend();
        let clock = ManualClock::new();
        let config = small_config();

        EvaluationOrchestrator::new(&backend, &clock, &config)
            .run(&create_sample_dataset())
            .await
            .unwrap();

        let mut live = 0i32;
        for call in backend.calls() {
            match call {
                Call::CreateDatabase(_) => {
                    live += 1;
                    assert_eq!(live, 1);
                }
                Call::Delete(_) => live -= 1,
                _ => {}
            }
        }
        assert_eq!(live, 0);
    }

    #[tokio::test]
    async fn test_stale_indices_are_cleared_first() {
        let backend = backend().with_active(&["squad-leftover", "stuck"]);
        backend.refuse_delete("stuck");
        let clock = ManualClock::new();
        let config = small_config();

        let run = EvaluationOrchestrator::new(&backend, &clock, &config)
            .run(&create_sample_dataset())
            .await
            .unwrap();

        assert_eq!(run.cleared_indices, vec!["squad-leftover".to_string()]);
        assert_eq!(backend.deleted_indices()[0], "squad-leftover");
        assert!(!run.report.rows.is_empty());
    }

    #[tokio::test]
    async fn test_provision_failure_discards_report() {
        let backend = backend();
        backend.fail_embeddings(u32::MAX);
        let clock = ManualClock::new();
        let config = small_config();

        let result = EvaluationOrchestrator::new(&backend, &clock, &config)
            .run_evaluation(&create_sample_dataset())
            .await;

        assert!(matches!(result, Err(EvalError::Provision { .. })));
    }

    #[tokio::test]
    async fn test_empty_dataset_yields_empty_report() {
        let backend = backend();
        let clock = ManualClock::new();
        let config = small_config();

        let report = EvaluationOrchestrator::new(&backend, &clock, &config)
            .run_evaluation(&Dataset::new("empty"))
            .await
            .unwrap();

        assert!(report.rows.is_empty());
        assert_eq!(report.to_csv().lines().count(), 1);
        assert!(backend.created_indices().is_empty());
    }
}
