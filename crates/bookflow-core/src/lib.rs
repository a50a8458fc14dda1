//! `bookflow-core` — shared types, configuration and error kinds for the
//! OpenLibrary → `books` table workflow.

pub mod config;
pub mod error;
pub mod handoff;
pub mod schedule;
pub mod types;

pub use config::BookflowConfig;
pub use error::{BookflowError, Result};
pub use handoff::{Handoff, RunContext};
pub use schedule::Schedule;
pub use types::{BookRecord, RunBatch, RunId, RunType};
