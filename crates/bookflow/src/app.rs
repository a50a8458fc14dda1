use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use bookflow_core::config::{BookflowConfig, StagingBackend};
use bookflow_core::Handoff;
use bookflow_scheduler::{RetryPolicy, RunHistory, SchedulerEngine, Workflow};
use bookflow_sink::{BookSink, SqliteSink};
use bookflow_source::{BookSource, OpenLibraryClient};
use bookflow_staging::{MemoryHandoff, SqliteHandoff};
use tokio::sync::watch;
use tracing::info;

use crate::tasks::{
    CreateTable, FetchBookData, InsertBookData, CREATE_TABLE_TASK_ID, FETCH_TASK_ID,
};

/// Wire the three tasks into the workflow:
/// `fetch_book_data → create_table → insert_book_data`.
pub fn build_workflow(
    dag_id: &str,
    source: Arc<dyn BookSource>,
    sink: Arc<dyn BookSink>,
    limit: u32,
) -> bookflow_scheduler::Result<Workflow> {
    let mut workflow = Workflow::new(dag_id);
    workflow.add_task(Box::new(FetchBookData::new(source, limit)), &[])?;
    workflow.add_task(Box::new(CreateTable::new(Arc::clone(&sink))), &[FETCH_TASK_ID])?;
    workflow.add_task(
        Box::new(InsertBookData::new(sink)),
        &[FETCH_TASK_ID, CREATE_TABLE_TASK_ID],
    )?;
    Ok(workflow)
}

/// Build the engine, history store and handoff backend described by `config`.
pub fn build_engine(config: &BookflowConfig) -> anyhow::Result<SchedulerEngine> {
    let source: Arc<dyn BookSource> = Arc::new(OpenLibraryClient::new(&config.source)?);
    let sink: Arc<dyn BookSink> = Arc::new(SqliteSink::new(&config.database));
    let workflow = build_workflow(&config.scheduler.dag_id, source, sink, config.source.limit)?;

    let state_path = &config.scheduler.state_path;
    ensure_parent_dir(state_path)?;
    info!(path = %state_path, "opening scheduler state");
    let history = RunHistory::open(state_path)
        .with_context(|| format!("opening run history at {state_path}"))?;

    let handoff: Arc<dyn Handoff> = match config.staging.backend {
        StagingBackend::Memory => Arc::new(MemoryHandoff::new()),
        StagingBackend::Sqlite => Arc::new(SqliteHandoff::open(state_path)?),
    };

    Ok(SchedulerEngine::new(
        workflow,
        history,
        handoff,
        RetryPolicy::from(&config.scheduler),
    )
    .with_schedule(config.scheduler.schedule.clone(), config.scheduler.catchup))
}

/// Run the scheduler daemon until `stop` resolves.
///
/// If the daemon exits on its own first (e.g. its run history is unreadable),
/// that is reported as an error instead of waiting on `stop` forever.
pub async fn serve_until<F>(engine: SchedulerEngine, stop: F) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handle = tokio::spawn(engine.run(shutdown_rx));

    tokio::select! {
        joined = &mut handle => {
            joined?.context("scheduler stopped")?;
            anyhow::bail!("scheduler stopped before shutdown was requested");
        }
        () = stop => {
            info!("shutdown requested, stopping scheduler");
            let _ = shutdown_tx.send(true);
            handle.await?.context("scheduler stopped")?;
        }
    }
    Ok(())
}

pub fn ensure_parent_dir(path: &str) -> std::io::Result<()> {
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
