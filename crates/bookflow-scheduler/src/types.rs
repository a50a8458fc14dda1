use std::time::Duration;

use bookflow_core::config::SchedulerConfig;
use serde::{Deserialize, Serialize};

/// Overall state of one workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// State of a single task attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Attempt in progress.
    Running,
    Success,
    /// Attempt failed and another one is scheduled after the retry delay.
    UpForRetry,
    /// Attempt failed and no retries remain.
    Failed,
    /// Never executed because a task it depends on did not succeed.
    UpstreamFailed,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Running => "running",
            TaskState::Success => "success",
            TaskState::UpForRetry => "up_for_retry",
            TaskState::Failed => "failed",
            TaskState::UpstreamFailed => "upstream_failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "running" => Ok(TaskState::Running),
            "success" => Ok(TaskState::Success),
            "up_for_retry" => Ok(TaskState::UpForRetry),
            "failed" => Ok(TaskState::Failed),
            "upstream_failed" => Ok(TaskState::UpstreamFailed),
            other => Err(format!("unknown task state: {other}")),
        }
    }
}

/// A persisted workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DagRun {
    pub dag_id: String,
    pub run_id: String,
    /// `scheduled` or `manual`.
    pub run_type: String,
    /// RFC3339 instant the run stands for (its schedule slot).
    pub logical_date: String,
    pub status: RunStatus,
    pub started_at: String,
    pub finished_at: Option<String>,
    /// Message of the error that failed the run, if any.
    pub error: Option<String>,
}

/// One attempt of one task within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInstance {
    pub run_id: String,
    pub task_id: String,
    /// 1-based attempt number; 0 for tasks that never ran.
    pub try_number: u32,
    pub state: TaskState,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    /// Stable error code, e.g. `FETCH_ERROR`.
    pub error_code: Option<String>,
    pub error: Option<String>,
}

/// Fixed retry policy applied to every task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure.
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries + 1
    }
}

impl From<&SchedulerConfig> for RetryPolicy {
    fn from(config: &SchedulerConfig) -> Self {
        Self::new(config.retries, Duration::from_secs(config.retry_delay_secs))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&SchedulerConfig::default())
    }
}
