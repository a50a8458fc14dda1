use std::time::Duration;

use async_trait::async_trait;
use bookflow_core::config::SourceConfig;
use bookflow_core::{BookflowError, Result, RunBatch};
use tracing::{debug, info, warn};

use crate::normalize::normalize_response;

/// Error bodies longer than this are cut before logging.
const MAX_LOGGED_BODY_CHARS: usize = 512;

/// Anything that can produce one batch of normalized books.
#[async_trait]
pub trait BookSource: Send + Sync {
    /// The search term, used in error reports.
    fn query(&self) -> &str;

    /// Fetch at most `limit` books. Never returns an empty batch.
    async fn fetch(&self, limit: u32) -> Result<RunBatch>;
}

/// Client for the OpenLibrary search endpoint.
pub struct OpenLibraryClient {
    client: reqwest::Client,
    endpoint: String,
    query: String,
    timeout: Duration,
}

impl OpenLibraryClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(timeout)
            .build()
            .map_err(|e| BookflowError::Config(format!("http client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}{}",
                config.base_url.trim_end_matches('/'),
                config.search_path
            ),
            query: config.query.clone(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport_error(&self, e: reqwest::Error) -> BookflowError {
        let reason = if e.is_timeout() {
            format!("request timed out after {}s", self.timeout.as_secs())
        } else {
            e.to_string()
        };
        BookflowError::Fetch {
            status: e.status().map(|s| s.as_u16()),
            reason,
        }
    }
}

#[async_trait]
impl BookSource for OpenLibraryClient {
    fn query(&self) -> &str {
        &self.query
    }

    async fn fetch(&self, limit: u32) -> Result<RunBatch> {
        if limit == 0 {
            return Err(BookflowError::Config(
                "fetch limit must be a positive integer".to_string(),
            ));
        }

        debug!(endpoint = %self.endpoint, query = %self.query, limit, "querying OpenLibrary");

        let limit_param = limit.to_string();
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", self.query.as_str()), ("limit", limit_param.as_str())])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                body = %truncate_for_log(&text, MAX_LOGGED_BODY_CHARS),
                body_len = text.len(),
                "OpenLibrary API error"
            );
            return Err(BookflowError::Fetch {
                status: Some(status.as_u16()),
                reason: format!("unexpected status {status}"),
            });
        }

        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        let parsed: serde_json::Value = match serde_json::from_str(&body) {
            Ok(v) => v,
            Err(e) => {
                warn!("OpenLibrary response is not JSON ({e}); treating as zero documents");
                serde_json::Value::Null
            }
        };

        let batch = normalize_response(&parsed);
        if batch.is_empty() {
            return Err(BookflowError::EmptyResult {
                query: self.query.clone(),
            });
        }

        info!(count = batch.len(), query = %self.query, "fetched books from OpenLibrary");
        Ok(batch)
    }
}

/// First `max` characters of `text`, cut on a char boundary.
fn truncate_for_log(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
