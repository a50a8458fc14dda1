use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookflowError {
    /// Transport failure, timeout or non-2xx answer from the source API.
    #[error("Fetch failed{}: {reason}", status_suffix(.status))]
    Fetch { status: Option<u16>, reason: String },

    /// The source answered but nothing normalized out of it.
    #[error("No books found for query {query:?}")]
    EmptyResult { query: String },

    /// A consumer asked for a slot its producer never filled in this run.
    #[error("No handoff value for key {key:?} from task {producer:?} in run {run_id}")]
    MissingHandoff {
        run_id: String,
        key: String,
        producer: String,
    },

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Handoff store error: {0}")]
    Handoff(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BookflowError {
    /// Short error code string persisted with failed task attempts.
    pub fn code(&self) -> &'static str {
        match self {
            BookflowError::Fetch { .. } => "FETCH_ERROR",
            BookflowError::EmptyResult { .. } => "EMPTY_RESULT",
            BookflowError::MissingHandoff { .. } => "MISSING_HANDOFF",
            BookflowError::Sink(_) => "SINK_ERROR",
            BookflowError::Handoff(_) => "HANDOFF_ERROR",
            BookflowError::Config(_) => "CONFIG_ERROR",
            BookflowError::Serialization(_) => "SERIALIZATION_ERROR",
            BookflowError::Io(_) => "IO_ERROR",
            BookflowError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, BookflowError>;

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}
