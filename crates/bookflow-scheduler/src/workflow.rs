use async_trait::async_trait;
use bookflow_core::{Result as TaskResult, RunContext};

use crate::error::{Result, SchedulerError};

/// One step of a workflow.
///
/// `execute` must be safe to call again with the same context: a retry
/// re-runs it from scratch.
#[async_trait]
pub trait Task: Send + Sync {
    fn id(&self) -> &str;

    async fn execute(&self, ctx: &RunContext) -> TaskResult<()>;
}

pub(crate) struct Node {
    pub(crate) task: Box<dyn Task>,
    pub(crate) upstream: Vec<String>,
}

/// An ordered set of tasks with their upstream dependencies.
///
/// Tasks execute sequentially in the order they were added. A task may only
/// depend on tasks added before it, so insertion order is always a valid
/// topological order.
pub struct Workflow {
    dag_id: String,
    pub(crate) nodes: Vec<Node>,
}

impl Workflow {
    pub fn new(dag_id: impl Into<String>) -> Self {
        Self {
            dag_id: dag_id.into(),
            nodes: Vec::new(),
        }
    }

    pub fn dag_id(&self) -> &str {
        &self.dag_id
    }

    /// Append `task`, running after every task named in `upstream`.
    pub fn add_task(&mut self, task: Box<dyn Task>, upstream: &[&str]) -> Result<()> {
        let id = task.id().to_string();
        if self.contains(&id) {
            return Err(SchedulerError::InvalidWorkflow(format!(
                "duplicate task id {id:?}"
            )));
        }
        for up in upstream {
            if !self.contains(up) {
                return Err(SchedulerError::InvalidWorkflow(format!(
                    "task {id:?} depends on unknown or later task {up:?}"
                )));
            }
        }
        self.nodes.push(Node {
            task,
            upstream: upstream.iter().map(|s| s.to_string()).collect(),
        });
        Ok(())
    }

    /// Task ids in execution order.
    pub fn task_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.task.id()).collect()
    }

    pub fn upstream_of(&self, task_id: &str) -> Option<&[String]> {
        self.nodes
            .iter()
            .find(|n| n.task.id() == task_id)
            .map(|n| n.upstream.as_slice())
    }

    fn contains(&self, task_id: &str) -> bool {
        self.nodes.iter().any(|n| n.task.id() == task_id)
    }
}
