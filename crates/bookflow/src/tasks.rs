use std::sync::Arc;

use async_trait::async_trait;
use bookflow_core::{BookflowError, Result, RunContext};
use bookflow_scheduler::Task;
use bookflow_sink::BookSink;
use bookflow_source::BookSource;
use tracing::info;

pub const FETCH_TASK_ID: &str = "fetch_book_data";
pub const CREATE_TABLE_TASK_ID: &str = "create_table";
pub const INSERT_TASK_ID: &str = "insert_book_data";
/// Handoff key under which the fetched batch is published.
pub const BOOK_DATA_KEY: &str = "book_data";

/// Fetches and normalizes one batch, then publishes it for the load step.
pub struct FetchBookData {
    source: Arc<dyn BookSource>,
    limit: u32,
}

impl FetchBookData {
    pub fn new(source: Arc<dyn BookSource>, limit: u32) -> Self {
        Self { source, limit }
    }
}

#[async_trait]
impl Task for FetchBookData {
    fn id(&self) -> &str {
        FETCH_TASK_ID
    }

    async fn execute(&self, ctx: &RunContext) -> Result<()> {
        let batch = self.source.fetch(self.limit).await?;
        ctx.push(FETCH_TASK_ID, BOOK_DATA_KEY, &batch)?;
        info!(run_id = %ctx.run_id, rows = batch.len(), "book data staged");
        Ok(())
    }
}

/// Ensures the destination table exists.
pub struct CreateTable {
    sink: Arc<dyn BookSink>,
}

impl CreateTable {
    pub fn new(sink: Arc<dyn BookSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Task for CreateTable {
    fn id(&self) -> &str {
        CREATE_TABLE_TASK_ID
    }

    async fn execute(&self, _ctx: &RunContext) -> Result<()> {
        self.sink.ensure_schema()
    }
}

/// Loads the batch staged by [`FetchBookData`] into the destination.
pub struct InsertBookData {
    sink: Arc<dyn BookSink>,
}

impl InsertBookData {
    pub fn new(sink: Arc<dyn BookSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Task for InsertBookData {
    fn id(&self) -> &str {
        INSERT_TASK_ID
    }

    async fn execute(&self, ctx: &RunContext) -> Result<()> {
        let batch = ctx.pull(BOOK_DATA_KEY, FETCH_TASK_ID)?;
        // An empty slot is as fatal as a missing one: never load zero rows.
        if batch.is_empty() {
            return Err(BookflowError::MissingHandoff {
                run_id: ctx.run_id.to_string(),
                key: BOOK_DATA_KEY.to_string(),
                producer: FETCH_TASK_ID.to_string(),
            });
        }
        let rows = self.sink.write_batch(&batch)?;
        info!(run_id = %ctx.run_id, rows, "book data loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use bookflow_core::{BookRecord, RunBatch};
    use bookflow_staging::MemoryHandoff;
    use chrono::Utc;

    #[derive(Default)]
    struct RecordingSink {
        schema_calls: Mutex<u32>,
        written: Mutex<Vec<BookRecord>>,
    }

    impl BookSink for RecordingSink {
        fn ensure_schema(&self) -> Result<()> {
            *self.schema_calls.lock().unwrap() += 1;
            Ok(())
        }

        fn write_batch(&self, batch: &RunBatch) -> Result<usize> {
            self.written.lock().unwrap().extend(batch.iter().cloned());
            Ok(batch.len())
        }
    }

    struct FixedSource(RunBatch);

    #[async_trait]
    impl BookSource for FixedSource {
        fn query(&self) -> &str {
            "fixed"
        }

        async fn fetch(&self, limit: u32) -> Result<RunBatch> {
            Ok(self.0.iter().take(limit as usize).cloned().collect())
        }
    }

    fn book(title: &str) -> BookRecord {
        BookRecord {
            title: title.to_string(),
            author: "Unknown Author".to_string(),
            price: "N/A".to_string(),
            rating: "N/A".to_string(),
            year: "Unknown Year".to_string(),
        }
    }

    fn ctx() -> RunContext {
        RunContext::new("dag", "manual__test".into(), Utc::now(), Arc::new(MemoryHandoff::new()))
    }

    #[tokio::test]
    async fn fetch_then_insert_loads_staged_rows_in_order() {
        let ctx = ctx();
        let sink = Arc::new(RecordingSink::default());
        let source = Arc::new(FixedSource(vec![book("a"), book("b"), book("c")]));

        FetchBookData::new(source, 2).execute(&ctx).await.unwrap();
        CreateTable::new(sink.clone()).execute(&ctx).await.unwrap();
        InsertBookData::new(sink.clone()).execute(&ctx).await.unwrap();

        assert_eq!(*sink.schema_calls.lock().unwrap(), 1);
        assert_eq!(*sink.written.lock().unwrap(), vec![book("a"), book("b")]);
    }

    #[tokio::test]
    async fn insert_without_fetch_is_fatal() {
        let sink = Arc::new(RecordingSink::default());
        let err = InsertBookData::new(sink.clone())
            .execute(&ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, BookflowError::MissingHandoff { .. }));
        assert!(sink.written.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_staged_batch_is_fatal() {
        let ctx = ctx();
        ctx.push(FETCH_TASK_ID, BOOK_DATA_KEY, &Vec::new()).unwrap();
        let sink = Arc::new(RecordingSink::default());
        let err = InsertBookData::new(sink).execute(&ctx).await.unwrap_err();
        assert_eq!(err.code(), "MISSING_HANDOFF");
    }
}
