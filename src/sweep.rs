//! Per-paragraph sweep over the configuration space.

use crate::backend::{BackendSettings, QaBackend};
use crate::config::ApiKeys;
use crate::configuration::{ConfigurationTuple, IndexPlan, SweepSpace, enumerate_index_plans};
use crate::dataset::{Paragraph, QuestionAnswer};
use crate::error::{EvalError, Result};
use crate::index::{IndexHandle, IndexLifecycleManager};
use crate::judge::{AnswerJudge, Verdict};
use crate::score::ScoreRecord;
use tracing::{debug, info, warn};

/// Options that change what the sweep logs, not what it scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOptions {
    pub log_misses: bool,
    /// Chunks fetched for a miss diagnostic.
    pub miss_context_k: u32,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            log_misses: false,
            miss_context_k: 5,
        }
    }
}

/// Evaluates every configuration on one paragraph at a time.
///
/// Configurations that share stored vectors share an index: one provision and
/// one teardown per [`IndexPlan`].
pub struct ConfigurationSweeper<'a> {
    backend: &'a dyn QaBackend,
    manager: IndexLifecycleManager<'a>,
    judge: AnswerJudge,
    keys: &'a ApiKeys,
    plans: Vec<IndexPlan>,
    options: SweepOptions,
}

impl<'a> ConfigurationSweeper<'a> {
    pub fn new(
        backend: &'a dyn QaBackend,
        manager: IndexLifecycleManager<'a>,
        keys: &'a ApiKeys,
        space: &SweepSpace,
        index_prefix: &str,
        options: SweepOptions,
    ) -> Self {
        Self {
            backend,
            manager,
            judge: AnswerJudge::new(),
            keys,
            plans: enumerate_index_plans(space, index_prefix),
            options,
        }
    }

    /// Index plans evaluated for every paragraph, in order.
    pub fn plans(&self) -> &[IndexPlan] {
        &self.plans
    }

    /// Score every configuration against one paragraph.
    ///
    /// A provisioning failure aborts the paragraph and is returned as is; the
    /// caller treats it as fatal.
    pub async fn evaluate_paragraph(&self, paragraph: &Paragraph) -> Result<Vec<ScoreRecord>> {
        let mut records: Vec<ScoreRecord> = Vec::new();

        for plan in &self.plans {
            let Some(first) = plan.configurations.first() else {
                continue;
            };
            let settings = BackendSettings::for_configuration(first, self.keys);

            let mut handle = self
                .manager
                .provision(&plan.index_name, &paragraph.context, &settings)
                .await?;

            for configuration in &plan.configurations {
                if records.iter().any(|r| r.configuration == *configuration) {
                    debug!(%configuration, "Configuration already scored for this paragraph");
                    continue;
                }

                info!("Evaluating with {}", configuration);
                let record = self
                    .evaluate_configuration(&handle, paragraph, configuration)
                    .await?;
                records.push(record);
            }

            self.manager.teardown(&mut handle).await?;
        }

        Ok(records)
    }

    async fn evaluate_configuration(
        &self,
        handle: &IndexHandle,
        paragraph: &Paragraph,
        configuration: &ConfigurationTuple,
    ) -> Result<ScoreRecord> {
        if !handle.state().is_live() {
            return Err(EvalError::Backend(format!(
                "index {} is not ready for queries ({:?})",
                handle.name(),
                handle.state()
            )));
        }

        let settings = BackendSettings::for_configuration(configuration, self.keys);
        let mut record = ScoreRecord::new(paragraph.context.clone(), *configuration);

        for qa in &paragraph.questions {
            let answer = self
                .backend
                .query(handle.name(), &qa.question, &settings)
                .await?;
            let verdict = self.judge.judge(&answer, qa);
            if verdict == Verdict::Miss && self.options.log_misses {
                self.log_miss(handle.name(), qa, &answer, &settings).await;
            }
            record.record(verdict);
        }

        Ok(record)
    }

    async fn log_miss(
        &self,
        index_name: &str,
        qa: &QuestionAnswer,
        answer: &str,
        settings: &BackendSettings,
    ) {
        let references = qa
            .reference_answers
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" || ");
        info!(question = %qa.question, answer, references = %references, "Missed question");

        match self
            .backend
            .find_k_nearest(index_name, &qa.question, self.options.miss_context_k, settings)
            .await
        {
            Ok(chunks) => {
                for (rank, chunk) in chunks.iter().enumerate() {
                    info!(rank = rank + 1, chunk = %chunk.text, "Retrieved context");
                }
            }
            Err(err) => warn!(error = %err, "Could not fetch context for missed question"),
        }
    }
}
