use bookflow_core::{BookflowError, Handoff, Result, RunBatch, RunId};
use dashmap::DashMap;
use tracing::debug;

type SlotKey = (RunId, String, String);

/// In-process handoff for single-process execution.
#[derive(Default)]
pub struct MemoryHandoff {
    slots: DashMap<SlotKey, RunBatch>,
}

impl MemoryHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live slots across all runs.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Handoff for MemoryHandoff {
    fn put(&self, run_id: &RunId, producer: &str, key: &str, batch: &RunBatch) -> Result<()> {
        self.slots.insert(
            (run_id.clone(), producer.to_string(), key.to_string()),
            batch.clone(),
        );
        debug!(%run_id, producer, key, rows = batch.len(), "handoff stored");
        Ok(())
    }

    fn get(&self, run_id: &RunId, key: &str, producer: &str) -> Result<RunBatch> {
        self.slots
            .get(&(run_id.clone(), producer.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BookflowError::MissingHandoff {
                run_id: run_id.to_string(),
                key: key.to_string(),
                producer: producer.to_string(),
            })
    }

    fn clear_run(&self, run_id: &RunId) -> Result<usize> {
        let mut removed = 0;
        self.slots.retain(|(run, _, _), _| {
            let keep = run != run_id;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}
