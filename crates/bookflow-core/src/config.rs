use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::schedule::Schedule;

pub const DEFAULT_DAG_ID: &str = "fetchstore_openlibrary_books";
pub const DEFAULT_BASE_URL: &str = "https://openlibrary.org";
pub const DEFAULT_SEARCH_PATH: &str = "/search.json";
pub const DEFAULT_QUERY: &str = "data engineering";
pub const DEFAULT_LIMIT: u32 = 50;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RETRIES: u32 = 1;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5 * 60;
pub const DEFAULT_INTERVAL_SECS: u64 = 24 * 60 * 60;
/// Longest accepted interval schedule: ten years.
pub const MAX_INTERVAL_SECS: u64 = 10 * 366 * 24 * 60 * 60;
pub const DEFAULT_USER_AGENT: &str = concat!("bookflow/", env!("CARGO_PKG_VERSION"));

/// Top-level config (bookflow.toml + BOOKFLOW_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookflowConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub staging: StagingConfig,
}

/// Where and how books are fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_search_path")]
    pub search_path: String,
    #[serde(default = "default_query")]
    pub query: String,
    /// Upper bound on the number of documents requested per run.
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            search_path: default_search_path(),
            query: default_query(),
            limit: DEFAULT_LIMIT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: default_user_agent(),
        }
    }
}

/// Destination database holding the `books` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    /// How long a writer waits on a locked database before giving up.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_dag_id")]
    pub dag_id: String,
    #[serde(default)]
    pub schedule: Schedule,
    /// Extra attempts after the first failure of a task.
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// SQLite file for run history (and the sqlite handoff backend).
    #[serde(default = "default_state_path")]
    pub state_path: String,
    /// When false, windows missed while the daemon was down are skipped.
    #[serde(default)]
    pub catchup: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            dag_id: default_dag_id(),
            schedule: Schedule::default(),
            retries: DEFAULT_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            state_path: default_state_path(),
            catchup: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagingBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagingConfig {
    #[serde(default)]
    pub backend: StagingBackend,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_search_path() -> String {
    DEFAULT_SEARCH_PATH.to_string()
}
fn default_query() -> String {
    DEFAULT_QUERY.to_string()
}
fn default_limit() -> u32 {
    DEFAULT_LIMIT
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_busy_timeout_ms() -> u64 {
    5_000
}
fn default_dag_id() -> String {
    DEFAULT_DAG_ID.to_string()
}
fn default_retries() -> u32 {
    DEFAULT_RETRIES
}
fn default_retry_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY_SECS
}
fn default_db_path() -> String {
    format!("{}/books.db", home_dir())
}
fn default_state_path() -> String {
    format!("{}/bookflow-state.db", home_dir())
}

fn home_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.bookflow", home)
}

impl BookflowConfig {
    /// Load config from a TOML file with BOOKFLOW_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.bookflow/bookflow.toml
    ///
    /// A missing file is not an error: every field has a default. Nested keys
    /// are separated by a double underscore, e.g. `BOOKFLOW_SOURCE__LIMIT=10`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: BookflowConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("BOOKFLOW_").split("__"))
            .extract()
            .map_err(|e| crate::error::BookflowError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> crate::error::Result<()> {
        use crate::error::BookflowError;

        if self.source.limit == 0 {
            return Err(BookflowError::Config(
                "source.limit must be a positive integer".to_string(),
            ));
        }
        if self.source.timeout_secs == 0 {
            return Err(BookflowError::Config(
                "source.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if let Schedule::Interval { every_secs } = self.scheduler.schedule {
            if every_secs == 0 || every_secs > MAX_INTERVAL_SECS {
                return Err(BookflowError::Config(format!(
                    "scheduler.schedule interval must be between 1 and {MAX_INTERVAL_SECS} seconds"
                )));
            }
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    format!("{}/bookflow.toml", home_dir())
}
