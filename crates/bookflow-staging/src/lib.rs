//! `bookflow-staging` — run-scoped handoff backends.
//!
//! | Backend          | Use                                             |
//! |------------------|-------------------------------------------------|
//! | `MemoryHandoff`  | Single-process runs (default)                   |
//! | `SqliteHandoff`  | Persistent slots shared through a SQLite file   |

pub mod db;
pub mod memory;
pub mod sqlite;

pub use memory::MemoryHandoff;
pub use sqlite::SqliteHandoff;
