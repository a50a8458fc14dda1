use std::path::Path;
use std::time::Duration;

use bookflow_core::config::DatabaseConfig;
use bookflow_core::{BookflowError, Result, RunBatch};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::db::{init_db, INSERT_BOOK};
use crate::types::BookRow;

/// Destination of normalized books.
pub trait BookSink: Send + Sync {
    /// Create the destination table if needed. Idempotent.
    fn ensure_schema(&self) -> Result<()>;

    /// Append every record, in order. Returns the number of rows inserted.
    fn write_batch(&self, batch: &RunBatch) -> Result<usize>;
}

/// Writes to a SQLite file.
///
/// A connection is opened for each call and dropped before it returns, so
/// nothing is held between runs. `write_batch` loads the whole batch in one
/// transaction: a failure on any row rolls back the rows before it.
pub struct SqliteSink {
    path: String,
    busy_timeout: Duration,
}

impl SqliteSink {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            path: config.path.clone(),
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        if let Some(parent) = Path::new(&self.path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| BookflowError::Sink(format!("{}: {e}", parent.display())))?;
            }
        }
        let conn = Connection::open(&self.path).map_err(sink_error)?;
        conn.busy_timeout(self.busy_timeout).map_err(sink_error)?;
        Ok(conn)
    }

    /// Total rows currently in `books`.
    pub fn count_rows(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))
            .map_err(sink_error)?;
        Ok(count as u64)
    }

    /// Most recent rows first.
    pub fn list_rows(&self, limit: usize) -> Result<Vec<BookRow>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, title, authors, price, rating, year
                 FROM books ORDER BY id DESC LIMIT ?1",
            )
            .map_err(sink_error)?;
        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok(BookRow {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    authors: row.get(2)?,
                    price: row.get(3)?,
                    rating: row.get(4)?,
                    year: row.get(5)?,
                })
            })
            .map_err(sink_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(sink_error)?;
        Ok(rows)
    }
}

impl BookSink for SqliteSink {
    fn ensure_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        init_db(&conn).map_err(sink_error)?;
        debug!(path = %self.path, "books table ensured");
        Ok(())
    }

    fn write_batch(&self, batch: &RunBatch) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connect()?;
        let tx = conn.transaction().map_err(sink_error)?;
        {
            let mut stmt = tx.prepare(INSERT_BOOK).map_err(sink_error)?;
            for book in batch {
                stmt.execute(rusqlite::params![
                    book.title,
                    book.author,
                    book.price,
                    book.rating,
                    book.year,
                ])
                .map_err(sink_error)?;
            }
        }
        tx.commit().map_err(sink_error)?;

        info!(rows = batch.len(), path = %self.path, "books inserted");
        Ok(batch.len())
    }
}

fn sink_error(e: rusqlite::Error) -> BookflowError {
    BookflowError::Sink(e.to_string())
}
