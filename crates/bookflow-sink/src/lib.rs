//! `bookflow-sink` — append-only writer for the `books` table.

pub mod db;
pub mod types;
pub mod writer;

pub use types::BookRow;
pub use writer::{BookSink, SqliteSink};
