use serde::Serialize;

/// A persisted `books` row as read back from the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookRow {
    pub id: i64,
    pub title: String,
    pub authors: Option<String>,
    pub price: Option<String>,
    pub rating: Option<String>,
    pub year: Option<String>,
}
