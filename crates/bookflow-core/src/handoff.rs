use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{RunBatch, RunId};

/// Run-scoped key/value slots used by one task to hand its result to a later one.
///
/// A slot is addressed by `(run_id, producer_task_id, key)`. Writing the same
/// slot twice replaces the value, so a retried producer simply re-pushes.
pub trait Handoff: Send + Sync {
    fn put(&self, run_id: &RunId, producer: &str, key: &str, batch: &RunBatch) -> Result<()>;

    /// Fails with `BookflowError::MissingHandoff` when the slot was never written.
    fn get(&self, run_id: &RunId, key: &str, producer: &str) -> Result<RunBatch>;

    /// Drop every slot belonging to `run_id`. Returns how many were removed.
    fn clear_run(&self, run_id: &RunId) -> Result<usize>;
}

/// Explicit per-run context passed to every task.
#[derive(Clone)]
pub struct RunContext {
    pub dag_id: String,
    pub run_id: RunId,
    pub logical_date: DateTime<Utc>,
    pub handoff: Arc<dyn Handoff>,
}

impl RunContext {
    pub fn new(
        dag_id: impl Into<String>,
        run_id: RunId,
        logical_date: DateTime<Utc>,
        handoff: Arc<dyn Handoff>,
    ) -> Self {
        Self {
            dag_id: dag_id.into(),
            run_id,
            logical_date,
            handoff,
        }
    }

    /// Publish `batch` under `key` on behalf of `producer`.
    pub fn push(&self, producer: &str, key: &str, batch: &RunBatch) -> Result<()> {
        self.handoff.put(&self.run_id, producer, key, batch)
    }

    /// Read what `producer` published under `key` earlier in this run.
    pub fn pull(&self, key: &str, producer: &str) -> Result<RunBatch> {
        self.handoff.get(&self.run_id, key, producer)
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("dag_id", &self.dag_id)
            .field("run_id", &self.run_id)
            .field("logical_date", &self.logical_date)
            .finish_non_exhaustive()
    }
}
