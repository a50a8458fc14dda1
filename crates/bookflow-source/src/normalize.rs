use bookflow_core::types::{BookRecord, NOT_AVAILABLE, NO_TITLE, UNKNOWN_AUTHOR, UNKNOWN_YEAR};
use serde_json::Value;

/// One entry of the search response's `docs` list.
///
/// Every field is optional. A field present with the wrong JSON type is
/// treated as absent rather than failing the whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDocument {
    pub title: Option<String>,
    pub author_name: Option<Vec<String>>,
    pub first_publish_year: Option<i64>,
}

impl RawDocument {
    /// Extract the fields we care about from one `docs` entry.
    /// Returns `None` when the entry is not a JSON object.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let title = obj.get("title").and_then(Value::as_str).map(String::from);
        let author_name = obj.get("author_name").and_then(Value::as_array).map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        });
        let first_publish_year = obj.get("first_publish_year").and_then(Value::as_i64);

        Some(Self {
            title,
            author_name,
            first_publish_year,
        })
    }
}

/// Map a raw document onto the fixed five-column shape.
///
/// Sentinels are only applied here; everything before this point works with
/// `Option`s. Author order follows the source list exactly.
pub fn normalize(doc: &RawDocument) -> BookRecord {
    let title = doc
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(NO_TITLE)
        .to_string();

    let authors: Vec<&str> = doc
        .author_name
        .iter()
        .flatten()
        .map(String::as_str)
        .filter(|a| !a.is_empty())
        .collect();
    let author = if authors.is_empty() {
        UNKNOWN_AUTHOR.to_string()
    } else {
        authors.join(", ")
    };

    let year = doc
        .first_publish_year
        .map(|y| y.to_string())
        .unwrap_or_else(|| UNKNOWN_YEAR.to_string());

    BookRecord {
        title,
        author,
        price: NOT_AVAILABLE.to_string(),
        rating: NOT_AVAILABLE.to_string(),
        year,
    }
}

/// Pull every normalizable document out of a search response body.
///
/// A body without a `docs` array yields no records; entries that are not
/// objects are skipped.
pub fn normalize_response(body: &Value) -> Vec<BookRecord> {
    body.get("docs")
        .and_then(Value::as_array)
        .map(|docs| {
            docs.iter()
                .filter_map(RawDocument::from_json)
                .map(|doc| normalize(&doc))
                .collect()
        })
        .unwrap_or_default()
}
