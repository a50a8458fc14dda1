use rusqlite::{Connection, Result};

/// Initialise the handoff table. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS handoffs (
            run_id      TEXT NOT NULL,
            producer    TEXT NOT NULL,
            key         TEXT NOT NULL,
            value       TEXT NOT NULL,   -- JSON-encoded RunBatch
            created_at  TEXT NOT NULL,
            PRIMARY KEY (run_id, producer, key)
        );",
    )
}
