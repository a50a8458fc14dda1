//! `bookflow` — the `fetchstore_openlibrary_books` workflow: fetch books from
//! OpenLibrary, stage them for the run, append them to the `books` table.

pub mod app;
pub mod tasks;

pub use app::{build_engine, build_workflow, serve_until};
