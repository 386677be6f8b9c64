//! Scriptable in-memory backend for tests.

use super::{BackendSettings, QaBackend, RetrievedChunk};
use crate::error::{EvalError, Result};
use crate::judge::REFUSAL_ANSWER;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateDatabase(String),
    Delete(String),
    ListActive,
    CreateEmbeddings(String),
    Query { index: String, k: u32 },
    FindNearest(String),
    DescribeStats(String),
    ZeroVector(String),
}

#[derive(Default)]
struct State {
    active: BTreeSet<String>,
    /// Indices created but not yet listed, with the number of listings left to hide them.
    creating: HashMap<String, u32>,
    /// Indices deleted but still listed, with the number of listings left to show them.
    deleting: HashMap<String, u32>,
    populated: HashSet<String>,
    stats_failures_left: HashMap<String, u32>,
    embedding_failures_left: u32,
    empty_zero_vector_left: u32,
    undeletable: HashSet<String>,
    list_fails: bool,
    answers: HashMap<String, String>,
    calls: Vec<Call>,
}

/// In-memory [`QaBackend`] with configurable eventual consistency and failures.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<State>,
    listing_lag: u32,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Newly created or deleted indices only show up (or disappear) after `lag` listings.
    pub fn with_listing_lag(mut self, lag: u32) -> Self {
        self.listing_lag = lag;
        self
    }

    /// The backend answers `question` with `answer`; unknown questions get the refusal.
    pub fn answer(self, question: &str, answer: &str) -> Self {
        self.state()
            .answers
            .insert(question.to_string(), answer.to_string());
        self
    }

    /// Indices that already exist before the run.
    pub fn with_active(self, names: &[&str]) -> Self {
        self.state()
            .active
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    /// Fail the next `count` embedding uploads.
    pub fn fail_embeddings(&self, count: u32) {
        self.state().embedding_failures_left = count;
    }

    /// Fail the stats probe `count` times for `index`.
    pub fn fail_stats(&self, index: &str, count: u32) {
        self.state()
            .stats_failures_left
            .insert(index.to_string(), count);
    }

    /// Return no matches from the next `count` zero-vector probes.
    pub fn delay_parsing(&self, count: u32) {
        self.state().empty_zero_vector_left = count;
    }

    /// Deleting `index` fails.
    pub fn refuse_delete(&self, index: &str) {
        self.state().undeletable.insert(index.to_string());
    }

    /// Listing active indices fails.
    pub fn fail_listing(&self) {
        self.state().list_fails = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn created_indices(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CreateDatabase(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn deleted_indices(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Delete(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    /// Indices currently live, including ones not yet visible to listings.
    pub fn live_indices(&self) -> BTreeSet<String> {
        let state = self.state();
        state
            .active
            .iter()
            .filter(|name| !state.deleting.contains_key(*name))
            .cloned()
            .chain(state.creating.keys().cloned())
            .collect()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake backend state poisoned")
    }
}

#[async_trait]
impl QaBackend for FakeBackend {
    async fn create_database(&self, index_name: &str, _settings: &BackendSettings) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::CreateDatabase(index_name.to_string()));
        if state.active.contains(index_name) || state.creating.contains_key(index_name) {
            return Err(EvalError::Backend(format!("index {} already exists", index_name)));
        }
        state.creating.insert(index_name.to_string(), self.listing_lag);
        Ok(())
    }

    async fn delete_all_embeddings(&self, index_name: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::Delete(index_name.to_string()));
        if state.undeletable.contains(index_name) {
            return Err(EvalError::Backend(format!("cannot delete {}", index_name)));
        }
        state.populated.remove(index_name);
        if state.creating.remove(index_name).is_some() || state.active.contains(index_name) {
            state.active.insert(index_name.to_string());
            state.deleting.insert(index_name.to_string(), self.listing_lag);
        }
        Ok(())
    }

    async fn list_active_index_names(&self) -> Result<BTreeSet<String>> {
        let mut state = self.state();
        state.calls.push(Call::ListActive);
        if state.list_fails {
            return Err(EvalError::Backend("controller unavailable".to_string()));
        }

        let mut appeared = Vec::new();
        for (name, lag) in state.creating.iter_mut() {
            if *lag == 0 {
                appeared.push(name.clone());
            } else {
                *lag -= 1;
            }
        }
        for name in appeared {
            state.creating.remove(&name);
            state.active.insert(name);
        }

        let mut gone = Vec::new();
        for (name, lag) in state.deleting.iter_mut() {
            if *lag == 0 {
                gone.push(name.clone());
            } else {
                *lag -= 1;
            }
        }
        for name in gone {
            state.deleting.remove(&name);
            state.active.remove(&name);
        }

        Ok(state.active.clone())
    }

    async fn create_embeddings(
        &self,
        index_name: &str,
        _text: &str,
        _settings: &BackendSettings,
    ) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::CreateEmbeddings(index_name.to_string()));
        if state.embedding_failures_left > 0 {
            state.embedding_failures_left -= 1;
            return Err(EvalError::Backend("embedding upload rejected".to_string()));
        }
        state.populated.insert(index_name.to_string());
        Ok(())
    }

    async fn query(
        &self,
        index_name: &str,
        question: &str,
        settings: &BackendSettings,
    ) -> Result<String> {
        let mut state = self.state();
        state.calls.push(Call::Query {
            index: index_name.to_string(),
            k: settings.k,
        });
        if !state.populated.contains(index_name) {
            return Err(EvalError::Backend(format!("index {} is empty", index_name)));
        }
        Ok(state
            .answers
            .get(question)
            .cloned()
            .unwrap_or_else(|| REFUSAL_ANSWER.to_string()))
    }

    async fn find_k_nearest(
        &self,
        index_name: &str,
        _query: &str,
        k: u32,
        _settings: &BackendSettings,
    ) -> Result<Vec<RetrievedChunk>> {
        let mut state = self.state();
        state.calls.push(Call::FindNearest(index_name.to_string()));
        Ok((0..k)
            .map(|i| RetrievedChunk {
                text: format!("chunk {}", i),
                score: None,
            })
            .collect())
    }

    async fn describe_index_stats(&self, index_name: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DescribeStats(index_name.to_string()));
        if let Some(left) = state.stats_failures_left.get_mut(index_name) {
            if *left > 0 {
                *left -= 1;
                return Err(EvalError::Backend("index not ready".to_string()));
            }
        }
        Ok(())
    }

    async fn query_zero_vector(&self, index_name: &str, _dimension: usize) -> Result<usize> {
        let mut state = self.state();
        state.calls.push(Call::ZeroVector(index_name.to_string()));
        if state.empty_zero_vector_left > 0 {
            state.empty_zero_vector_left -= 1;
            return Ok(0);
        }
        Ok(usize::from(state.populated.contains(index_name)))
    }
}
