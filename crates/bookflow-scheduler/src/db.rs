use rusqlite::Connection;

use crate::error::Result;

/// Initialise the run-history schema in `conn`.
///
/// Creates `dag_runs` and `task_instances` (idempotent). Every attempt of a
/// task is its own `task_instances` row, keyed by `try_number`.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS dag_runs (
            dag_id        TEXT NOT NULL,
            run_id        TEXT NOT NULL,
            run_type      TEXT NOT NULL,   -- scheduled | manual
            logical_date  TEXT NOT NULL,   -- RFC3339, UTC, fixed width
            status        TEXT NOT NULL,
            started_at    TEXT NOT NULL,
            finished_at   TEXT,
            error         TEXT,
            PRIMARY KEY (dag_id, run_id)
        );

        CREATE INDEX IF NOT EXISTS idx_dag_runs_logical
            ON dag_runs (dag_id, run_type, logical_date);

        CREATE TABLE IF NOT EXISTS task_instances (
            dag_id        TEXT    NOT NULL,
            run_id        TEXT    NOT NULL,
            task_id       TEXT    NOT NULL,
            try_number    INTEGER NOT NULL,
            state         TEXT    NOT NULL,
            started_at    TEXT,
            finished_at   TEXT,
            error_code    TEXT,
            error         TEXT,
            PRIMARY KEY (dag_id, run_id, task_id, try_number)
        );
        ",
    )?;
    Ok(())
}
