use std::sync::Mutex;
use std::time::Duration;

use bookflow_core::{BookflowError, Handoff, Result, RunBatch, RunId};
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::db::init_db;

/// Handoff persisted in SQLite, for runs whose steps may execute in
/// different processes. Values are stored as JSON.
pub struct SqliteHandoff {
    db: Mutex<Connection>,
}

impl SqliteHandoff {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn).map_err(store_error)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).map_err(store_error)?;
        conn.busy_timeout(Duration::from_secs(5)).map_err(store_error)?;
        Self::new(conn)
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| BookflowError::Handoff("handoff connection poisoned".to_string()))
    }
}

impl Handoff for SqliteHandoff {
    fn put(&self, run_id: &RunId, producer: &str, key: &str, batch: &RunBatch) -> Result<()> {
        let value = serde_json::to_string(batch)?;
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.conn()?;
        db.execute(
            "INSERT INTO handoffs (run_id, producer, key, value, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(run_id, producer, key)
             DO UPDATE SET value = excluded.value, created_at = excluded.created_at",
            rusqlite::params![run_id.as_str(), producer, key, value, now],
        )
        .map_err(store_error)?;
        debug!(%run_id, producer, key, rows = batch.len(), "handoff persisted");
        Ok(())
    }

    fn get(&self, run_id: &RunId, key: &str, producer: &str) -> Result<RunBatch> {
        let db = self.conn()?;
        let value: Option<String> = db
            .query_row(
                "SELECT value FROM handoffs
                 WHERE run_id = ?1 AND producer = ?2 AND key = ?3",
                rusqlite::params![run_id.as_str(), producer, key],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_error)?;

        match value {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Err(BookflowError::MissingHandoff {
                run_id: run_id.to_string(),
                key: key.to_string(),
                producer: producer.to_string(),
            }),
        }
    }

    fn clear_run(&self, run_id: &RunId) -> Result<usize> {
        let db = self.conn()?;
        db.execute("DELETE FROM handoffs WHERE run_id = ?1", [run_id.as_str()])
            .map_err(store_error)
    }
}

fn store_error(e: rusqlite::Error) -> BookflowError {
    BookflowError::Handoff(e.to_string())
}
