use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Defines when and how often the workflow should run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Run exactly once at the given UTC instant.
    Once { at: DateTime<Utc> },

    /// Run repeatedly with a fixed interval in seconds.
    Interval { every_secs: u64 },

    /// Run every day at the given hour and minute (UTC).
    Daily { hour: u8, minute: u8 },

    /// Run on a specific weekday (0 = Monday … 6 = Sunday) at the given time (UTC).
    Weekly { day: u8, hour: u8, minute: u8 },
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule::Interval {
            every_secs: crate::config::DEFAULT_INTERVAL_SECS,
        }
    }
}
