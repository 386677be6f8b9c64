//! Per-paragraph win/miss tallies.

use crate::configuration::ConfigurationTuple;
use crate::judge::Verdict;
use serde::{Deserialize, Serialize};

/// Wins and misses of one configuration on one paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub wins: u32,
    pub misses: u32,
    pub paragraph_context: String,
    pub configuration: ConfigurationTuple,
}

impl ScoreRecord {
    /// Create an empty tally.
    pub fn new(paragraph_context: impl Into<String>, configuration: ConfigurationTuple) -> Self {
        Self {
            wins: 0,
            misses: 0,
            paragraph_context: paragraph_context.into(),
            configuration,
        }
    }

    pub fn count_win(&mut self) {
        self.wins += 1;
    }

    pub fn count_miss(&mut self) {
        self.misses += 1;
    }

    /// Apply a judge verdict.
    pub fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Win => self.count_win(),
            Verdict::Miss => self.count_miss(),
        }
    }

    /// Number of questions scored so far.
    pub fn total(&self) -> u32 {
        self.wins + self.misses
    }

    /// Whether anything was recorded at all.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::ChunkGeometry;
    use crate::models::{ChunkModel, CompletionModel, EmbeddingModel, KnnAlgorithm};

    fn configuration() -> ConfigurationTuple {
        ConfigurationTuple::new(
            EmbeddingModel::OpenAi,
            CompletionModel::NlpCloud,
            KnnAlgorithm::Euclidean,
            ChunkModel::Arbitrary,
            ChunkGeometry::new(15, 3),
            3,
        )
    }

    #[test]
    fn test_record_verdicts() {
        let mut score = ScoreRecord::new("context", configuration());
        assert!(score.is_empty());

        score.record(Verdict::Win);
        score.record(Verdict::Miss);
        score.record(Verdict::Win);

        assert_eq!(score.wins, 2);
        assert_eq!(score.misses, 1);
        assert_eq!(score.total(), 3);
    }
}
