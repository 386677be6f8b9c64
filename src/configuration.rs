//! Configuration tuples and the enumeration of the sweep space.
//!
//! Enumeration is pure: the sweeper and the report both consume the
//! sequences produced here instead of nesting their own loops.

use crate::error::{EvalError, Result};
use crate::models::{ChunkModel, CompletionModel, EmbeddingModel, KnnAlgorithm};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Chunk size and overlap used by the arbitrary-size chunk model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkGeometry {
    pub size: u32,
    pub overlap: u32,
}

impl ChunkGeometry {
    /// Geometry recorded for chunk models that ignore size and overlap.
    pub const NONE: ChunkGeometry = ChunkGeometry { size: 0, overlap: 0 };

    pub fn new(size: u32, overlap: u32) -> Self {
        Self { size, overlap }
    }
}

impl fmt::Display for ChunkGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} & {}", self.size, self.overlap)
    }
}

/// One point of the configuration space. This is the aggregation key of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigurationTuple {
    pub embedding_model: EmbeddingModel,
    pub completion_model: CompletionModel,
    pub knn_algorithm: KnnAlgorithm,
    pub chunk_model: ChunkModel,
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub k: u32,
}

impl ConfigurationTuple {
    /// Build a tuple, zeroing the geometry when the chunk model ignores it.
    pub fn new(
        embedding_model: EmbeddingModel,
        completion_model: CompletionModel,
        knn_algorithm: KnnAlgorithm,
        chunk_model: ChunkModel,
        geometry: ChunkGeometry,
        k: u32,
    ) -> Self {
        let geometry = if chunk_model.uses_geometry() {
            geometry
        } else {
            ChunkGeometry::NONE
        };

        Self {
            embedding_model,
            completion_model,
            knn_algorithm,
            chunk_model,
            chunk_size: geometry.size,
            chunk_overlap: geometry.overlap,
            k,
        }
    }

    pub fn geometry(&self) -> ChunkGeometry {
        ChunkGeometry::new(self.chunk_size, self.chunk_overlap)
    }

    /// Name of the index this configuration is evaluated against.
    pub fn index_name(&self, prefix: &str) -> String {
        index_name(prefix, self.embedding_model, self.knn_algorithm, self.chunk_model)
    }
}

impl fmt::Display for ConfigurationTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {}",
            self.embedding_model,
            self.knn_algorithm,
            self.chunk_model,
            self.completion_model,
            self.chunk_size,
            self.chunk_overlap,
            self.k
        )
    }
}

/// Derive the index name. Completion model, geometry and k never take part:
/// they do not change the stored vectors.
pub fn index_name(
    prefix: &str,
    embedding_model: EmbeddingModel,
    knn_algorithm: KnnAlgorithm,
    chunk_model: ChunkModel,
) -> String {
    format!(
        "{}-{}-{}-{}",
        prefix,
        embedding_model.as_str(),
        knn_algorithm.as_str(),
        chunk_model.as_str()
    )
}

fn default_geometries() -> Vec<ChunkGeometry> {
    vec![
        ChunkGeometry::new(10, 5),
        ChunkGeometry::new(15, 3),
        ChunkGeometry::new(20, 2),
    ]
}

fn default_k_values() -> Vec<u32> {
    vec![1, 3, 5]
}

/// The dimensions swept by an evaluation run, each in canonical order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSpace {
    #[serde(default = "default_embedding_models")]
    pub embedding_models: Vec<EmbeddingModel>,
    #[serde(default = "default_completion_models")]
    pub completion_models: Vec<CompletionModel>,
    #[serde(default = "default_knn_algorithms")]
    pub knn_algorithms: Vec<KnnAlgorithm>,
    #[serde(default = "default_chunk_models")]
    pub chunk_models: Vec<ChunkModel>,
    #[serde(default = "default_geometries")]
    pub chunk_geometries: Vec<ChunkGeometry>,
    #[serde(default = "default_k_values")]
    pub k_values: Vec<u32>,
}

fn default_embedding_models() -> Vec<EmbeddingModel> {
    EmbeddingModel::ALL.to_vec()
}

fn default_completion_models() -> Vec<CompletionModel> {
    CompletionModel::ALL.to_vec()
}

fn default_knn_algorithms() -> Vec<KnnAlgorithm> {
    KnnAlgorithm::ALL.to_vec()
}

fn default_chunk_models() -> Vec<ChunkModel> {
    ChunkModel::ALL.to_vec()
}

impl Default for SweepSpace {
    fn default() -> Self {
        Self {
            embedding_models: default_embedding_models(),
            completion_models: default_completion_models(),
            knn_algorithms: default_knn_algorithms(),
            chunk_models: default_chunk_models(),
            chunk_geometries: default_geometries(),
            k_values: default_k_values(),
        }
    }
}

impl SweepSpace {
    /// Reject spaces that would silently evaluate nothing or make no sense.
    pub fn validate(&self) -> Result<()> {
        let empty = [
            ("embedding_models", self.embedding_models.is_empty()),
            ("completion_models", self.completion_models.is_empty()),
            ("knn_algorithms", self.knn_algorithms.is_empty()),
            ("chunk_models", self.chunk_models.is_empty()),
            ("chunk_geometries", self.chunk_geometries.is_empty()),
            ("k_values", self.k_values.is_empty()),
        ];
        if let Some((name, _)) = empty.iter().find(|(_, is_empty)| *is_empty) {
            return Err(EvalError::Config(format!(
                "sweep.{} must list at least one value",
                name
            )));
        }

        if self.k_values.contains(&0) {
            return Err(EvalError::Config(
                "sweep.k_values must be greater than zero".to_string(),
            ));
        }

        for geometry in &self.chunk_geometries {
            if geometry.size == 0 || geometry.overlap >= geometry.size {
                return Err(EvalError::Config(format!(
                    "chunk geometry {} needs a positive size larger than its overlap",
                    geometry
                )));
            }
        }

        Ok(())
    }

    /// Geometries evaluated for a chunk model: the configured list for the
    /// arbitrary model, a single empty geometry otherwise.
    pub fn geometries_for(&self, chunk_model: ChunkModel) -> Vec<ChunkGeometry> {
        if chunk_model.uses_geometry() {
            self.chunk_geometries.clone()
        } else {
            vec![ChunkGeometry::NONE]
        }
    }
}

/// Every configuration the sweep evaluates, in sweep order, without duplicates.
///
/// Sweep order is embedding model, KNN algorithm, chunk model, geometry,
/// completion model, k. Fixed-granularity chunk models contribute each
/// (completion model, k) pair once.
pub fn enumerate_configurations(space: &SweepSpace) -> Vec<ConfigurationTuple> {
    let mut seen = HashSet::new();
    let mut tuples = Vec::new();

    for &embedding_model in &space.embedding_models {
        for &knn_algorithm in &space.knn_algorithms {
            for &chunk_model in &space.chunk_models {
                for &geometry in &space.chunk_geometries {
                    for &completion_model in &space.completion_models {
                        for &k in &space.k_values {
                            let tuple = ConfigurationTuple::new(
                                embedding_model,
                                completion_model,
                                knn_algorithm,
                                chunk_model,
                                geometry,
                                k,
                            );
                            if seen.insert(tuple) {
                                tuples.push(tuple);
                            }
                        }
                    }
                }
            }
        }
    }

    tuples
}

/// One index to provision for a paragraph and the configurations answered from it.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPlan {
    pub index_name: String,
    pub embedding_model: EmbeddingModel,
    pub knn_algorithm: KnnAlgorithm,
    pub chunk_model: ChunkModel,
    pub geometry: ChunkGeometry,
    pub configurations: Vec<ConfigurationTuple>,
}

/// Group the enumerated configurations by the index they need.
///
/// Fixed-granularity chunk models get one plan per (embedding model, KNN
/// algorithm, chunk model); the arbitrary model gets one plan per geometry on
/// top of that, because the geometry changes the stored chunks.
pub fn enumerate_index_plans(space: &SweepSpace, prefix: &str) -> Vec<IndexPlan> {
    let mut plans: Vec<IndexPlan> = Vec::new();

    for tuple in enumerate_configurations(space) {
        let geometry = tuple.geometry();
        let same_index = plans.last().is_some_and(|plan| {
            plan.embedding_model == tuple.embedding_model
                && plan.knn_algorithm == tuple.knn_algorithm
                && plan.chunk_model == tuple.chunk_model
                && plan.geometry == geometry
        });

        if same_index {
            if let Some(plan) = plans.last_mut() {
                plan.configurations.push(tuple);
            }
        } else {
            plans.push(IndexPlan {
                index_name: tuple.index_name(prefix),
                embedding_model: tuple.embedding_model,
                knn_algorithm: tuple.knn_algorithm,
                chunk_model: tuple.chunk_model,
                geometry,
                configurations: vec![tuple],
            });
        }
    }

    plans
}

/// Configurations in report order: embedding model, completion model, KNN
/// algorithm, chunk model, then geometry and k.
pub fn report_order(space: &SweepSpace) -> Vec<ConfigurationTuple> {
    let mut seen = HashSet::new();
    let mut tuples = Vec::new();

    for &embedding_model in &space.embedding_models {
        for &completion_model in &space.completion_models {
            for &knn_algorithm in &space.knn_algorithms {
                for &chunk_model in &space.chunk_models {
                    for geometry in space.geometries_for(chunk_model) {
                        for &k in &space.k_values {
                            let tuple = ConfigurationTuple::new(
                                embedding_model,
                                completion_model,
                                knn_algorithm,
                                chunk_model,
                                geometry,
                                k,
                            );
                            if seen.insert(tuple) {
                                tuples.push(tuple);
                            }
                        }
                    }
                }
            }
        }
    }

    tuples
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple(chunk_model: ChunkModel, geometry: ChunkGeometry, k: u32) -> ConfigurationTuple {
        ConfigurationTuple::new(
            EmbeddingModel::OpenAi,
            CompletionModel::OpenAi,
            KnnAlgorithm::Cosine,
            chunk_model,
            geometry,
            k,
        )
    }

    #[test]
    fn test_fixed_granularity_ignores_geometry() {
        let a = tuple(ChunkModel::Sentences, ChunkGeometry::new(10, 5), 3);
        let b = tuple(ChunkModel::Sentences, ChunkGeometry::new(20, 2), 3);
        assert_eq!(a, b);
        assert_eq!(a.geometry(), ChunkGeometry::NONE);
    }

    #[test]
    fn test_index_name_ignores_completion_geometry_and_k() {
        let base = tuple(ChunkModel::Sentences, ChunkGeometry::new(10, 5), 1);
        let mut other = tuple(ChunkModel::Sentences, ChunkGeometry::new(15, 3), 5);
        other.completion_model = CompletionModel::NlpCloud;

        assert_eq!(base.index_name("squad"), other.index_name("squad"));
        assert_eq!(base.index_name("squad"), "squad-open-ai-cosine-sentences");
    }

    #[test]
    fn test_enumeration_deduplicates_fixed_granularity() {
        let space = SweepSpace::default();
        let tuples = enumerate_configurations(&space);

        // 2 embeddings * 3 knn * 2 completions * 3 k = 36 per chunk-model branch;
        // sentences once, arbitrary once per geometry.
        assert_eq!(tuples.len(), 36 + 36 * 3);

        let unique: HashSet<_> = tuples.iter().collect();
        assert_eq!(unique.len(), tuples.len());
    }

    #[test]
    fn test_enumeration_follows_sweep_order() {
        let space = SweepSpace::default();
        let tuples = enumerate_configurations(&space);

        let first = tuples[0];
        assert_eq!(first.embedding_model, EmbeddingModel::OpenAi);
        assert_eq!(first.knn_algorithm, KnnAlgorithm::Cosine);
        assert_eq!(first.chunk_model, ChunkModel::Sentences);
        assert_eq!(first.k, 1);

        // k varies fastest, then completion model
        assert_eq!(tuples[1].k, 3);
        assert_eq!(tuples[3].completion_model, CompletionModel::NlpCloud);
    }

    #[test]
    fn test_index_plans_count() {
        let space = SweepSpace::default();
        let plans = enumerate_index_plans(&space, "squad");

        // 6 (embedding, knn) pairs: one sentences plan and three arbitrary plans each
        assert_eq!(plans.len(), 6 * (1 + 3));

        let sentences = &plans[0];
        assert_eq!(sentences.chunk_model, ChunkModel::Sentences);
        assert_eq!(sentences.configurations.len(), 2 * 3);
        assert_eq!(sentences.index_name, "squad-open-ai-cosine-sentences");

        let arbitrary = &plans[1];
        assert_eq!(arbitrary.chunk_model, ChunkModel::Arbitrary);
        assert_eq!(arbitrary.geometry, ChunkGeometry::new(10, 5));
        assert!(
            arbitrary
                .configurations
                .iter()
                .all(|t| t.geometry() == ChunkGeometry::new(10, 5))
        );
    }

    #[test]
    fn test_report_order_groups_by_completion_before_knn() {
        let space = SweepSpace::default();
        let order = report_order(&space);

        assert_eq!(order.len(), enumerate_configurations(&space).len());
        assert_eq!(order[0].completion_model, CompletionModel::OpenAi);
        // sentences (1 geometry * 3 k) + arbitrary (3 geometries * 3 k) per knn
        assert_eq!(order[12].knn_algorithm, KnnAlgorithm::Euclidean);
        assert_eq!(order[4].geometry(), ChunkGeometry::new(10, 5));
    }

    #[test]
    fn test_validate_rejects_bad_spaces() {
        let mut space = SweepSpace::default();
        space.k_values.clear();
        assert!(space.validate().is_err());

        let mut space = SweepSpace::default();
        space.chunk_geometries = vec![ChunkGeometry::new(5, 5)];
        assert!(space.validate().is_err());

        assert!(SweepSpace::default().validate().is_ok());
    }
}
