use thiserror::Error;

/// Errors raised by the scheduler's own bookkeeping.
///
/// Task failures are not errors here: they are recorded in run history and
/// surface through the run's status.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The workflow graph is malformed (duplicate id, unknown upstream).
    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    /// A stored value could not be parsed back.
    #[error("Corrupt history record: {0}")]
    Corrupt(String),

    /// No run with the given ID exists in the store.
    #[error("Run not found: {run_id}")]
    RunNotFound { run_id: String },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
