use std::sync::Arc;

use bookflow_core::{BookflowError, Handoff, RunContext, RunId, RunType, Schedule};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::{
    error::Result,
    history::RunHistory,
    schedule::{initial_due, next_due},
    types::{DagRun, RetryPolicy, RunStatus, TaskState},
    workflow::{Node, Workflow},
};

/// Runs a [`Workflow`]: sequences its tasks, retries failures with a fixed
/// policy, records every attempt and drives the schedule.
pub struct SchedulerEngine {
    workflow: Workflow,
    history: RunHistory,
    handoff: Arc<dyn Handoff>,
    policy: RetryPolicy,
    schedule: Schedule,
    catchup: bool,
}

impl SchedulerEngine {
    pub fn new(
        workflow: Workflow,
        history: RunHistory,
        handoff: Arc<dyn Handoff>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            workflow,
            history,
            handoff,
            policy,
            schedule: Schedule::default(),
            catchup: false,
        }
    }

    /// Set the cadence used by [`SchedulerEngine::run`].
    pub fn with_schedule(mut self, schedule: Schedule, catchup: bool) -> Self {
        self.schedule = schedule;
        self.catchup = catchup;
        self
    }

    pub fn dag_id(&self) -> &str {
        self.workflow.dag_id()
    }

    pub fn history(&self) -> &RunHistory {
        &self.history
    }

    /// Execute one run of the workflow end to end.
    ///
    /// Task failures do not make this return `Err`: they are reflected in the
    /// returned run's status. `Err` means the history store itself failed; the
    /// run is then still closed as failed where possible, and its handoff
    /// slots are always cleared.
    pub async fn trigger(&self, run_type: RunType, logical_date: DateTime<Utc>) -> Result<DagRun> {
        let dag_id = self.workflow.dag_id();
        let run_id = RunId::new(run_type, logical_date);
        self.history
            .create_run(dag_id, &run_id, run_type, logical_date)?;
        info!(%run_id, dag_id, "run started");

        let ctx = RunContext::new(dag_id, run_id.clone(), logical_date, Arc::clone(&self.handoff));
        let outcome = self.run_tasks(&ctx).await;

        match self.handoff.clear_run(&run_id) {
            Ok(n) if n > 0 => info!(%run_id, slots = n, "handoff cleared"),
            Ok(_) => {}
            Err(e) => warn!(%run_id, "handoff cleanup failed: {e}"),
        }

        let failure = match outcome {
            Ok(failure) => failure,
            Err(e) => {
                let message = format!("run history write failed: {e}");
                if let Err(close_err) =
                    self.history
                        .finish_run(dag_id, &run_id, RunStatus::Failed, Some(&message))
                {
                    error!(%run_id, "could not close run: {close_err}");
                }
                error!(%run_id, "{message}");
                return Err(e);
            }
        };

        let status = if failure.is_none() {
            RunStatus::Success
        } else {
            RunStatus::Failed
        };
        self.history
            .finish_run(dag_id, &run_id, status, failure.as_deref())?;

        match status {
            RunStatus::Success => info!(%run_id, "run succeeded"),
            _ => error!(%run_id, error = failure.as_deref().unwrap_or(""), "run failed"),
        }
        self.history.get_run(dag_id, &run_id)
    }

    /// Execute every task in order. Returns the first task failure as
    /// `"{task_id}: {error}"`, or `None` when all tasks succeeded.
    async fn run_tasks(&self, ctx: &RunContext) -> Result<Option<String>> {
        let dag_id = self.workflow.dag_id();
        let run_id = &ctx.run_id;
        let mut settled: Vec<(&str, TaskState)> = Vec::with_capacity(self.workflow.nodes.len());
        let mut failure: Option<String> = None;

        for node in &self.workflow.nodes {
            let task_id = node.task.id();
            let blocked = node.upstream.iter().any(|up| {
                settled
                    .iter()
                    .any(|(id, state)| *id == up.as_str() && *state != TaskState::Success)
            });
            if blocked {
                warn!(%run_id, task_id, "skipping task: upstream did not succeed");
                self.history
                    .mark_skipped(dag_id, run_id, task_id, TaskState::UpstreamFailed)?;
                settled.push((task_id, TaskState::UpstreamFailed));
                continue;
            }

            match self.execute_with_retries(ctx, node).await? {
                Ok(()) => settled.push((task_id, TaskState::Success)),
                Err(e) => {
                    if failure.is_none() {
                        failure = Some(format!("{task_id}: {e}"));
                    }
                    settled.push((task_id, TaskState::Failed));
                }
            }
        }
        Ok(failure)
    }

    /// Run a task up to `policy.max_attempts()` times.
    ///
    /// The outer `Result` is a history failure; the inner one is the task's
    /// final outcome.
    async fn execute_with_retries(
        &self,
        ctx: &RunContext,
        node: &Node,
    ) -> Result<std::result::Result<(), BookflowError>> {
        let dag_id = self.workflow.dag_id();
        let task_id = node.task.id();
        let max_attempts = self.policy.max_attempts();
        let mut try_number = 1;

        loop {
            self.history
                .start_attempt(dag_id, &ctx.run_id, task_id, try_number)?;
            info!(run_id = %ctx.run_id, task_id, try_number, "task started");

            match node.task.execute(ctx).await {
                Ok(()) => {
                    self.history.end_attempt(
                        dag_id,
                        &ctx.run_id,
                        task_id,
                        try_number,
                        TaskState::Success,
                        None,
                    )?;
                    info!(run_id = %ctx.run_id, task_id, try_number, "task succeeded");
                    return Ok(Ok(()));
                }
                Err(e) => {
                    let message = e.to_string();
                    let retrying = try_number < max_attempts;
                    let state = if retrying {
                        TaskState::UpForRetry
                    } else {
                        TaskState::Failed
                    };
                    self.history.end_attempt(
                        dag_id,
                        &ctx.run_id,
                        task_id,
                        try_number,
                        state,
                        Some((e.code(), message.as_str())),
                    )?;

                    if !retrying {
                        error!(run_id = %ctx.run_id, task_id, try_number, code = e.code(), "task failed: {message}");
                        return Ok(Err(e));
                    }
                    warn!(
                        run_id = %ctx.run_id,
                        task_id,
                        try_number,
                        code = e.code(),
                        delay_secs = self.policy.delay.as_secs(),
                        "task failed, retrying: {message}"
                    );
                    tokio::time::sleep(self.policy.delay).await;
                    try_number += 1;
                }
            }
        }
    }

    /// When the daemon should fire next, resuming from run history.
    fn initial_due(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        let last = self.history.last_scheduled(self.workflow.dag_id())?;
        Ok(initial_due(&self.schedule, last, now))
    }

    /// Main event loop. Polls every second until `shutdown` broadcasts `true`
    /// (or its sender is dropped).
    ///
    /// Without catchup, a daemon that was down over several windows fires
    /// once for the first missed slot and then resumes the cadence from now.
    /// With catchup, every missed slot gets its own run.
    ///
    /// Returns `Err` only when run history cannot be read at startup.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(dag_id = self.dag_id(), schedule = ?self.schedule, "scheduler engine started");

        let mut next = self.initial_due(Utc::now()).inspect_err(|e| {
            error!("could not read run history: {e}");
        })?;
        if let Some(due) = next {
            info!(next_run = %due, "next run scheduled");
        }

        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Utc::now();
                    let Some(due) = next.filter(|due| *due <= now) else {
                        continue;
                    };
                    if let Err(e) = self.trigger(RunType::Scheduled, due).await {
                        error!("scheduled run could not be recorded: {e}");
                    }
                    next = next_due(&self.schedule, due, Utc::now(), self.catchup);
                    match next {
                        Some(at) => info!(next_run = %at, "next run scheduled"),
                        None => info!("schedule exhausted; waiting for shutdown"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}
