//! Aggregation of score records into the per-configuration report.

use crate::configuration::{ConfigurationTuple, SweepSpace, report_order};
use crate::models::{ChunkModel, CompletionModel, EmbeddingModel, KnnAlgorithm};
use crate::score::ScoreRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;

/// Header line of the CSV rendering.
pub const CSV_HEADER: &str =
    "Embedding Model,Completion Model,KNN Algorithm,Chunking Model,K,Arbitrary Chunk Values,Wins,Misses";

/// Totals for one configuration across every evaluated paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub embedding_model: EmbeddingModel,
    pub completion_model: CompletionModel,
    pub knn_algorithm: KnnAlgorithm,
    pub chunk_model: ChunkModel,
    pub k: u32,
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub wins: u32,
    pub misses: u32,
}

impl ReportRow {
    fn new(configuration: &ConfigurationTuple, wins: u32, misses: u32) -> Self {
        Self {
            embedding_model: configuration.embedding_model,
            completion_model: configuration.completion_model,
            knn_algorithm: configuration.knn_algorithm,
            chunk_model: configuration.chunk_model,
            k: configuration.k,
            chunk_size: configuration.chunk_size,
            chunk_overlap: configuration.chunk_overlap,
            wins,
            misses,
        }
    }

    /// Fraction of questions won, or `None` if nothing was scored.
    pub fn win_rate(&self) -> Option<f64> {
        let total = self.wins + self.misses;
        (total > 0).then(|| self.wins as f64 / total as f64)
    }

    fn to_csv_line(&self) -> String {
        format!(
            "{},{},{},{},{},{} & {},{},{}",
            self.embedding_model,
            self.completion_model,
            self.knn_algorithm,
            self.chunk_model,
            self.k,
            self.chunk_size,
            self.chunk_overlap,
            self.wins,
            self.misses
        )
    }
}

/// The aggregated result of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Dataset name.
    pub dataset_name: String,
    /// Paragraphs swept.
    pub paragraphs: usize,
    /// Questions asked per configuration.
    pub questions: usize,
    /// Rows in canonical order.
    pub rows: Vec<ReportRow>,
}

impl EvaluationReport {
    /// Render as CSV with a header line.
    pub fn to_csv(&self) -> String {
        let mut out = String::with_capacity(CSV_HEADER.len() + 1 + self.rows.len() * 64);
        out.push_str(CSV_HEADER);
        out.push('\n');
        for row in &self.rows {
            // Writing to a String cannot fail.
            let _ = writeln!(out, "{}", row.to_csv_line());
        }
        out
    }

    /// Row with the highest win rate, first in report order on ties.
    pub fn best(&self) -> Option<&ReportRow> {
        self.rows
            .iter()
            .filter_map(|row| row.win_rate().map(|rate| (row, rate)))
            .fold(None, |best: Option<(&ReportRow, f64)>, (row, rate)| match best {
                Some((_, best_rate)) if best_rate >= rate => best,
                _ => Some((row, rate)),
            })
            .map(|(row, _)| row)
    }

    /// Short human-readable summary of the run.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\n========== Sweep Results ==========");
        let _ = writeln!(out, "Dataset:        {}", self.dataset_name);
        let _ = writeln!(out, "Paragraphs:     {}", self.paragraphs);
        let _ = writeln!(out, "Questions:      {}", self.questions);
        let _ = writeln!(out, "Configurations: {}", self.rows.len());
        if let Some(best) = self.best() {
            let _ = writeln!(out, "-----------------------------------");
            let _ = writeln!(
                out,
                "Best: {} / {} / {} / {} k={} ({} & {}) {} wins, {} misses",
                best.embedding_model,
                best.completion_model,
                best.knn_algorithm,
                best.chunk_model,
                best.k,
                best.chunk_size,
                best.chunk_overlap,
                best.wins,
                best.misses
            );
        }
        let _ = writeln!(out, "===================================");
        out
    }
}

/// Folds score records into report rows.
pub struct ReportAggregator<'a> {
    space: &'a SweepSpace,
}

impl<'a> ReportAggregator<'a> {
    pub fn new(space: &'a SweepSpace) -> Self {
        Self { space }
    }

    /// Sum wins and misses per configuration and order the rows canonically.
    ///
    /// Configurations without a single win or miss are left out.
    pub fn aggregate(&self, records: &[ScoreRecord]) -> Vec<ReportRow> {
        let mut totals: HashMap<ConfigurationTuple, (u32, u32)> = HashMap::new();
        for record in records {
            let entry = totals.entry(record.configuration).or_default();
            entry.0 += record.wins;
            entry.1 += record.misses;
        }

        report_order(self.space)
            .iter()
            .filter_map(|configuration| {
                let &(wins, misses) = totals.get(configuration)?;
                (wins != 0 || misses != 0).then(|| ReportRow::new(configuration, wins, misses))
            })
            .collect()
    }
}
