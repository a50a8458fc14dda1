//! `bookflow-scheduler` — in-process runner for the book workflow, with
//! SQLite run history.
//!
//! # Overview
//!
//! A [`Workflow`] is an ordered list of [`Task`]s with upstream dependencies.
//! The [`SchedulerEngine`] executes one run at a time: tasks go in order, a
//! failed task is retried under a fixed [`RetryPolicy`], and tasks whose
//! upstream did not succeed are recorded as `upstream_failed`. Each run and
//! each attempt is persisted to the `dag_runs` / `task_instances` tables.
//!
//! # Schedule variants
//!
//! | Variant    | Behaviour                                          |
//! |------------|----------------------------------------------------|
//! | `Once`     | Single fire at an absolute UTC instant             |
//! | `Interval` | Repeat every N seconds (default: one day)          |
//! | `Daily`    | Fire at HH:MM UTC every day                        |
//! | `Weekly`   | Fire at HH:MM UTC on a specific weekday            |

pub mod db;
pub mod engine;
pub mod error;
pub mod history;
pub mod schedule;
pub mod types;
pub mod workflow;

pub use engine::SchedulerEngine;
pub use error::{Result, SchedulerError};
pub use history::RunHistory;
pub use types::{DagRun, RetryPolicy, RunStatus, TaskInstance, TaskState};
pub use workflow::{Task, Workflow};
