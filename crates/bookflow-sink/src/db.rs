use rusqlite::{Connection, Result};

/// Parameterized insert, one row per record. Column order is fixed.
pub const INSERT_BOOK: &str = "INSERT INTO books (title, authors, price, rating, year)
     VALUES (?1, ?2, ?3, ?4, ?5)";

/// Create the `books` table if it is absent. Safe to call on every run.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS books (
            id      INTEGER PRIMARY KEY AUTOINCREMENT,
            title   TEXT NOT NULL,
            authors TEXT,
            price   TEXT,
            rating  TEXT,
            year    TEXT
        );",
    )
}
