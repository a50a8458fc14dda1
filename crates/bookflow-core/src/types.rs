use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const NO_TITLE: &str = "No Title";
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";
pub const UNKNOWN_YEAR: &str = "Unknown Year";
/// OpenLibrary has neither price nor rating; both columns carry this placeholder.
pub const NOT_AVAILABLE: &str = "N/A";

/// One normalized book, ready for the `books` table.
///
/// Every field is always a non-empty string. Missing upstream data is encoded
/// with the sentinel constants above, never with an empty value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BookRecord {
    pub title: String,
    pub author: String,
    pub price: String,
    pub rating: String,
    pub year: String,
}

/// Ordered records produced by a single fetch.
pub type RunBatch = Vec<BookRecord>;

/// How a run was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunType {
    Scheduled,
    Manual,
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunType::Scheduled => write!(f, "scheduled"),
            RunType::Manual => write!(f, "manual"),
        }
    }
}

/// Identifier of one workflow run.
///
/// Format: `{run_type}__{logical_date}`, e.g. `scheduled__2025-04-30T00:00:00.000000Z`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new(run_type: RunType, logical_date: DateTime<Utc>) -> Self {
        Self(format!(
            "{}__{}",
            run_type,
            logical_date.to_rfc3339_opts(SecondsFormat::Micros, true)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
