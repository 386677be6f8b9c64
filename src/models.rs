//! The dimensions of the configuration space.
//!
//! Each enum lists its variants in canonical order. That order drives both the
//! sweep and the row order of the final report.

use crate::error::EvalError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parse by index name, ignoring case, dashes and underscores, so both
/// `dot-product` and `DOT_PRODUCT` are accepted.
macro_rules! impl_from_str {
    ($ty:ident, $what:literal) => {
        impl FromStr for $ty {
            type Err = EvalError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let wanted = s.trim().to_lowercase().replace(['-', '_'], "");
                $ty::ALL
                    .iter()
                    .copied()
                    .find(|value| value.as_str().replace('-', "") == wanted)
                    .ok_or_else(|| EvalError::Config(format!("unknown {} '{}'", $what, s)))
            }
        }
    };
}

/// Provider used to turn text chunks and questions into vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingModel {
    OpenAi,
    NlpCloud,
}

impl EmbeddingModel {
    pub const ALL: [EmbeddingModel; 2] = [EmbeddingModel::OpenAi, EmbeddingModel::NlpCloud];

    /// Value used inside index names.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingModel::OpenAi => "open-ai",
            EmbeddingModel::NlpCloud => "nlp-cloud",
        }
    }

    /// Length of the vectors this model produces.
    pub fn embedding_size(&self) -> usize {
        match self {
            EmbeddingModel::OpenAi => 1536,
            EmbeddingModel::NlpCloud => 768,
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            EmbeddingModel::OpenAi => Provider::OpenAi,
            EmbeddingModel::NlpCloud => Provider::NlpCloud,
        }
    }
}

impl fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingModel::OpenAi => write!(f, "OPEN_AI"),
            EmbeddingModel::NlpCloud => write!(f, "NLP_CLOUD"),
        }
    }
}

/// Provider used to generate the final answer from retrieved chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionModel {
    OpenAi,
    NlpCloud,
}

impl CompletionModel {
    pub const ALL: [CompletionModel; 2] = [CompletionModel::OpenAi, CompletionModel::NlpCloud];

    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionModel::OpenAi => "open-ai",
            CompletionModel::NlpCloud => "nlp-cloud",
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            CompletionModel::OpenAi => Provider::OpenAi,
            CompletionModel::NlpCloud => Provider::NlpCloud,
        }
    }
}

impl fmt::Display for CompletionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionModel::OpenAi => write!(f, "OPEN_AI"),
            CompletionModel::NlpCloud => write!(f, "NLP_CLOUD"),
        }
    }
}

/// Similarity metric the vector index is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KnnAlgorithm {
    Cosine,
    Euclidean,
    DotProduct,
}

impl KnnAlgorithm {
    pub const ALL: [KnnAlgorithm; 3] = [
        KnnAlgorithm::Cosine,
        KnnAlgorithm::Euclidean,
        KnnAlgorithm::DotProduct,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KnnAlgorithm::Cosine => "cosine",
            KnnAlgorithm::Euclidean => "euclidean",
            KnnAlgorithm::DotProduct => "dotproduct",
        }
    }
}

impl fmt::Display for KnnAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnnAlgorithm::Cosine => write!(f, "COSINE"),
            KnnAlgorithm::Euclidean => write!(f, "EUCLIDEAN"),
            KnnAlgorithm::DotProduct => write!(f, "DOT_PRODUCT"),
        }
    }
}

/// Strategy used to split a paragraph before embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkModel {
    /// One chunk per sentence. Chunk size and overlap have no effect.
    Sentences,
    /// Fixed-size windows; chunk size and overlap change the stored chunks.
    Arbitrary,
}

impl ChunkModel {
    pub const ALL: [ChunkModel; 2] = [ChunkModel::Sentences, ChunkModel::Arbitrary];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkModel::Sentences => "sentences",
            ChunkModel::Arbitrary => "arbitrary",
        }
    }

    /// Whether chunk size and overlap alter how a paragraph is split.
    pub fn uses_geometry(&self) -> bool {
        matches!(self, ChunkModel::Arbitrary)
    }
}

impl fmt::Display for ChunkModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkModel::Sentences => write!(f, "SENTENCES"),
            ChunkModel::Arbitrary => write!(f, "ARBITRARY"),
        }
    }
}

impl_from_str!(EmbeddingModel, "embedding model");
impl_from_str!(CompletionModel, "completion model");
impl_from_str!(KnnAlgorithm, "KNN algorithm");
impl_from_str!(ChunkModel, "chunk model");

/// Remote provider an API key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    NlpCloud,
}
