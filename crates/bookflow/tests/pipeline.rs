// Full workflow runs against a local OpenLibrary stand-in and temp SQLite files.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use bookflow::build_engine;
use bookflow_core::config::{BookflowConfig, StagingBackend};
use bookflow_core::RunType;
use bookflow_scheduler::{RunStatus, SchedulerEngine, TaskState};
use bookflow_sink::SqliteSink;
use chrono::Utc;
use serde_json::{json, Value};
use tempfile::TempDir;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn fixed(body: Value) -> Router {
    Router::new().route(
        "/search.json",
        get(move || {
            let body = body.clone();
            async move { Json(body) }
        }),
    )
}

fn config(dir: &TempDir, base_url: String) -> BookflowConfig {
    let mut config = BookflowConfig::default();
    config.source.base_url = base_url;
    config.source.timeout_secs = 5;
    config.database.path = dir.path().join("books.db").display().to_string();
    config.scheduler.state_path = dir.path().join("state.db").display().to_string();
    config.scheduler.retry_delay_secs = 0;
    config
}

async fn run_once(engine: &SchedulerEngine) -> bookflow_scheduler::DagRun {
    engine.trigger(RunType::Manual, Utc::now()).await.unwrap()
}

fn data_eng_101() -> Value {
    json!({
        "numFound": 1,
        "docs": [{
            "title": "Data Eng 101",
            "author_name": ["A", "B"],
            "first_publish_year": 2020
        }]
    })
}

#[tokio::test]
async fn single_book_is_loaded_end_to_end() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, serve(fixed(data_eng_101())).await);
    let engine = build_engine(&config).unwrap();

    let run = run_once(&engine).await;
    assert_eq!(run.status, RunStatus::Success, "{:?}", run.error);

    let rows = SqliteSink::new(&config.database).list_rows(10).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "Data Eng 101");
    assert_eq!(rows[0].authors.as_deref(), Some("A, B"));
    assert_eq!(rows[0].price.as_deref(), Some("N/A"));
    assert_eq!(rows[0].rating.as_deref(), Some("N/A"));
    assert_eq!(rows[0].year.as_deref(), Some("2020"));
}

#[tokio::test]
async fn missing_fields_are_loaded_as_sentinels() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, serve(fixed(json!({ "docs": [{}] }))).await);
    let engine = build_engine(&config).unwrap();

    let run = run_once(&engine).await;
    assert_eq!(run.status, RunStatus::Success);

    let rows = SqliteSink::new(&config.database).list_rows(10).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "No Title");
    assert_eq!(rows[0].authors.as_deref(), Some("Unknown Author"));
    assert_eq!(rows[0].year.as_deref(), Some("Unknown Year"));
}

#[tokio::test]
async fn empty_result_fails_run_without_touching_destination() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, serve(fixed(json!({ "docs": [] }))).await);
    let engine = build_engine(&config).unwrap();

    let run = run_once(&engine).await;
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.as_deref().unwrap().starts_with("fetch_book_data:"));

    let tis = engine
        .history()
        .task_instances(engine.dag_id(), &run.run_id.as_str().into())
        .unwrap();
    let fetch: Vec<_> = tis
        .iter()
        .filter(|t| t.task_id == "fetch_book_data")
        .collect();
    assert_eq!(fetch.len(), 2, "one retry after the first empty result");
    assert!(fetch
        .iter()
        .all(|t| t.error_code.as_deref() == Some("EMPTY_RESULT")));

    for downstream in ["create_table", "insert_book_data"] {
        let ti = tis.iter().find(|t| t.task_id == downstream).unwrap();
        assert_eq!(ti.state, TaskState::UpstreamFailed);
    }
    assert!(!Path::new(&config.database.path).exists());
}

#[tokio::test]
async fn transient_outage_is_recovered_by_retry() {
    let hits = Arc::new(AtomicU32::new(0));
    let counter = hits.clone();
    let router = Router::new().route(
        "/search.json",
        get(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    StatusCode::SERVICE_UNAVAILABLE.into_response()
                } else {
                    Json(data_eng_101()).into_response()
                }
            }
        }),
    );

    let dir = TempDir::new().unwrap();
    let config = config(&dir, serve(router).await);
    let engine = build_engine(&config).unwrap();

    let run = run_once(&engine).await;
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(SqliteSink::new(&config.database).count_rows().unwrap(), 1);

    let tis = engine
        .history()
        .task_instances(engine.dag_id(), &run.run_id.as_str().into())
        .unwrap();
    assert_eq!(tis[0].state, TaskState::UpForRetry);
    assert_eq!(tis[0].error_code.as_deref(), Some("FETCH_ERROR"));
}

#[tokio::test]
async fn repeated_runs_append_duplicates() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, serve(fixed(data_eng_101())).await);
    let engine = build_engine(&config).unwrap();

    for _ in 0..2 {
        assert_eq!(run_once(&engine).await.status, RunStatus::Success);
    }

    let rows = SqliteSink::new(&config.database).list_rows(10).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.title == "Data Eng 101"));
    assert_ne!(rows[0].id, rows[1].id);
    assert_eq!(engine.history().list_runs(engine.dag_id(), 10).unwrap().len(), 2);
}

#[tokio::test]
async fn sqlite_staging_backend_runs_the_same_workflow() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir, serve(fixed(data_eng_101())).await);
    config.staging.backend = StagingBackend::Sqlite;
    let engine = build_engine(&config).unwrap();

    let run = run_once(&engine).await;
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(SqliteSink::new(&config.database).count_rows().unwrap(), 1);
}

#[tokio::test]
async fn limit_is_forwarded_to_the_source() {
    let router = Router::new().route(
        "/search.json",
        get(
            |axum::extract::Query(params): axum::extract::Query<
                std::collections::HashMap<String, String>,
            >| async move {
                let limit: usize = params["limit"].parse().unwrap();
                let docs: Vec<Value> = (0..limit)
                    .map(|i| json!({ "title": format!("Book {i}") }))
                    .collect();
                Json(json!({ "docs": docs }))
            },
        ),
    );

    let dir = TempDir::new().unwrap();
    let mut config = config(&dir, serve(router).await);
    config.source.limit = 3;
    let engine = build_engine(&config).unwrap();

    assert_eq!(run_once(&engine).await.status, RunStatus::Success);
    let mut titles: Vec<_> = SqliteSink::new(&config.database)
        .list_rows(10)
        .unwrap()
        .into_iter()
        .map(|r| r.title)
        .collect();
    titles.reverse();
    assert_eq!(titles, ["Book 0", "Book 1", "Book 2"]);
}
