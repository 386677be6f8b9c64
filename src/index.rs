//! Lifecycle of remote vector indices.
//!
//! Creating an index is eventually consistent: the controller lists it after a
//! while, it accepts requests after another while, and uploaded vectors become
//! searchable later still. [`IndexLifecycleManager`] walks an [`IndexHandle`]
//! through those stages, waiting on each with [`poll_until`].

use crate::backend::{BackendSettings, QaBackend};
use crate::error::{EvalError, Result};
use crate::poll::{Clock, PollPolicy, RetryPolicy, poll_until, retry_with_budget};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where an index is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Absent,
    Creating,
    ReadyEmpty,
    Populating,
    Ready,
    Deleting,
}

impl IndexState {
    /// The only state this one may move to.
    pub fn next(&self) -> IndexState {
        match self {
            IndexState::Absent => IndexState::Creating,
            IndexState::Creating => IndexState::ReadyEmpty,
            IndexState::ReadyEmpty => IndexState::Populating,
            IndexState::Populating => IndexState::Ready,
            IndexState::Ready => IndexState::Deleting,
            IndexState::Deleting => IndexState::Absent,
        }
    }

    /// Whether the index exists remotely and may be populated or queried.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            IndexState::ReadyEmpty | IndexState::Populating | IndexState::Ready
        )
    }
}

/// A named remote index and its lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHandle {
    name: String,
    state: IndexState,
}

impl IndexHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: IndexState::Absent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    /// Move to `to`, which must be the successor of the current state.
    pub fn transition(&mut self, to: IndexState) -> Result<()> {
        if self.state.next() != to {
            return Err(EvalError::InvalidTransition {
                index: self.name.clone(),
                from: self.state,
                to,
            });
        }
        debug!(index = %self.name, from = ?self.state, to = ?to, "index state change");
        self.state = to;
        Ok(())
    }
}

/// Delays and budgets used while provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Readiness polling: listing, liveness probe, zero-vector probe, deletion.
    pub readiness: PollPolicy,
    /// Pause after the liveness probe before the first upload.
    pub settle_delay: Duration,
    pub embedding_retry: RetryPolicy,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            readiness: PollPolicy::unbounded(Duration::from_millis(500)),
            settle_delay: Duration::from_millis(500),
            embedding_retry: RetryPolicy {
                delay: Duration::from_millis(200),
                max_attempts: 10,
            },
        }
    }
}

/// Creates, populates and deletes indices on a [`QaBackend`].
pub struct IndexLifecycleManager<'a> {
    backend: &'a dyn QaBackend,
    clock: &'a dyn Clock,
    policy: LifecyclePolicy,
}

impl<'a> IndexLifecycleManager<'a> {
    pub fn new(backend: &'a dyn QaBackend, clock: &'a dyn Clock, policy: LifecyclePolicy) -> Self {
        Self {
            backend,
            clock,
            policy,
        }
    }

    /// Create `name`, store `context` in it and wait until it answers queries.
    ///
    /// Every failure is reported as [`EvalError::Provision`].
    pub async fn provision(
        &self,
        name: &str,
        context: &str,
        settings: &BackendSettings,
    ) -> Result<IndexHandle> {
        let mut handle = IndexHandle::new(name);
        self.provision_handle(&mut handle, context, settings)
            .await
            .map_err(|err| match err {
                EvalError::Provision { .. } => err,
                other => EvalError::provision(name, other.to_string()),
            })?;
        Ok(handle)
    }

    async fn provision_handle(
        &self,
        handle: &mut IndexHandle,
        context: &str,
        settings: &BackendSettings,
    ) -> Result<()> {
        let backend = self.backend;
        let name = handle.name().to_string();
        let name = name.as_str();

        info!(index = name, "Creating vector index");
        backend.create_database(name, settings).await?;
        handle.transition(IndexState::Creating)?;

        poll_until("index to be listed", self.policy.readiness, self.clock, || async move {
            Ok(backend.list_active_index_names().await?.contains(name))
        })
        .await?;
        info!(index = name, "Created vector index");

        poll_until("index to accept requests", self.policy.readiness, self.clock, || async move {
            Ok(backend.describe_index_stats(name).await.is_ok())
        })
        .await?;
        self.clock.sleep(self.policy.settle_delay).await;
        handle.transition(IndexState::ReadyEmpty)?;
        info!(index = name, "Index ready for requests");

        handle.transition(IndexState::Populating)?;
        retry_with_budget(
            "store embeddings",
            self.policy.embedding_retry,
            self.clock,
            || async move { backend.create_embeddings(name, context, settings).await },
        )
        .await
        .map_err(|err| {
            EvalError::provision(
                name,
                format!(
                    "could not store embeddings after {} attempts: {}",
                    self.policy.embedding_retry.max_attempts, err
                ),
            )
        })?;

        let dimension = settings.embedding_model.embedding_size();
        poll_until("index to parse embeddings", self.policy.readiness, self.clock, || async move {
            Ok(backend.query_zero_vector(name, dimension).await? > 0)
        })
        .await?;
        handle.transition(IndexState::Ready)?;
        info!(index = name, "Index parsed the embeddings");

        Ok(())
    }

    /// Delete the index and wait until the controller no longer lists it.
    pub async fn teardown(&self, handle: &mut IndexHandle) -> Result<()> {
        let backend = self.backend;
        let name = handle.name().to_string();
        let name = name.as_str();

        handle.transition(IndexState::Deleting)?;
        info!(index = name, "Deleting vector index");
        backend
            .delete_all_embeddings(name)
            .await
            .map_err(|err| EvalError::teardown(name, err.to_string()))?;

        poll_until("index to be deleted", self.policy.readiness, self.clock, || async move {
            Ok(!backend.list_active_index_names().await?.contains(name))
        })
        .await
        .map_err(|err| EvalError::teardown(name, err.to_string()))?;

        handle.transition(IndexState::Absent)?;
        info!(index = name, "Deleted vector index");
        Ok(())
    }

    /// Delete every index the controller lists and wait for the deletions to land.
    ///
    /// Failures are logged and never abort: a leftover index wastes resources
    /// but every configuration provisions under its own name. Returns the
    /// names that were deleted.
    pub async fn clear_stale_indices(&self, policy: PollPolicy) -> Vec<String> {
        let backend = self.backend;

        let active = match backend.list_active_index_names().await {
            Ok(active) => active,
            Err(err) => {
                warn!(error = %err, "Could not list existing indices; skipping cleanup");
                return Vec::new();
            }
        };
        if active.is_empty() {
            return Vec::new();
        }

        let mut deleted = Vec::new();
        for name in active {
            info!(index = %name, "Deleting stale vector index");
            match backend.delete_all_embeddings(&name).await {
                Ok(()) => deleted.push(name),
                Err(err) => warn!(index = %name, error = %err, "Did not delete the existing index"),
            }
        }

        let pending = deleted.as_slice();
        let waited = poll_until("stale indices to be deleted", policy, self.clock, || async move {
            let active = backend.list_active_index_names().await?;
            Ok(pending.iter().all(|name| !active.contains(name)))
        })
        .await;

        match waited {
            Ok(_) => info!(count = deleted.len(), "Deleted stale vector indices"),
            Err(err) => warn!(error = %err, "Stale indices may still be listed"),
        }
        deleted
    }
}
