use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::parser;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::config::{Config, NewsSource};

const MAX_CONCURRENT_FETCHES: usize = 8;
const MAX_LOGGED_ERRORS: usize = 100;

// Some feed hosts block obvious bot user agents, so present a browser one.
pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub(crate) const ACCEPT: &str =
    "application/rss+xml, application/xml, application/atom+xml, text/xml, */*";

/// Errors that can occur while fetching a single feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("request timed out")]
    Timeout,
    /// Response body was an HTML page or otherwise not RSS/Atom
    #[error("response is not an RSS/Atom feed")]
    NotAFeed,
    /// The proxy endpoint returned a JSON error body
    #[error("proxy error: {0}")]
    Proxy(String),
    /// Feed XML could not be parsed as RSS or Atom
    #[error("parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Success,
    Error,
}

/// Per-source fetch bookkeeping, exposed through `GET /api/status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStats {
    pub source_id: String,
    pub articles_count: usize,
    pub last_fetch: DateTime<Utc>,
    pub status: FetchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedError {
    pub source_id: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// A successfully fetched and parsed feed, still in raw `feed_rs` form.
pub struct FetchedFeed {
    pub source: NewsSource,
    pub entries: Vec<feed_rs::model::Entry>,
}

#[derive(Deserialize)]
struct ProxyErrorBody {
    error: String,
}

pub struct Fetcher {
    client: Client,
    timeout: Duration,
    max_retries: u32,
    proxy_base: Option<String>,
    stats: RwLock<HashMap<String, SourceStats>>,
    errors: RwLock<Vec<FeedError>>,
}

impl Fetcher {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            timeout: Duration::from_secs(config.fetch_timeout_secs),
            max_retries: config.max_retries,
            proxy_base: config.proxy_base.clone(),
            stats: RwLock::new(HashMap::new()),
            errors: RwLock::new(Vec::new()),
        }
    }

    /// Fetches all given sources concurrently. A failed source contributes
    /// nothing; only sources that yielded a parsed feed are returned.
    pub async fn fetch_all_feeds(&self, sources: &[NewsSource]) -> Vec<FetchedFeed> {
        let fetches: Vec<_> = sources.iter().map(|source| self.fetch_feed(source)).collect();
        let feeds: Vec<FetchedFeed> = stream::iter(fetches)
            .buffer_unordered(MAX_CONCURRENT_FETCHES)
            .filter_map(|feed| async move { feed })
            .collect()
            .await;

        info!(
            fetched = feeds.len(),
            attempted = sources.len(),
            "Feed fetch round complete"
        );
        feeds
    }

    /// Fetches and parses one source. Errors are logged and recorded in the
    /// per-source stats; the caller only sees `None`.
    pub async fn fetch_feed(&self, source: &NewsSource) -> Option<FetchedFeed> {
        match self.try_fetch_feed(source).await {
            Ok(feed) => {
                self.record_success(&source.id, feed.entries.len()).await;
                Some(feed)
            }
            Err(e) => {
                self.record_error(&source.id, &e).await;
                None
            }
        }
    }

    async fn try_fetch_feed(&self, source: &NewsSource) -> Result<FetchedFeed, FetchError> {
        let content = self.fetch_with_retry(&source.url).await?;

        if !is_valid_feed(&content) {
            return Err(FetchError::NotAFeed);
        }

        let parsed =
            parser::parse(content.as_bytes()).map_err(|e| FetchError::Parse(e.to_string()))?;

        if parsed.entries.is_empty() {
            warn!(source = %source.id, "No items found in feed");
        }

        Ok(FetchedFeed {
            source: source.clone(),
            entries: parsed.entries,
        })
    }

    /// Issues a GET with timeout, retrying with exponential backoff
    /// (1s, 2s, 4s) on network errors, non-2xx statuses, and bodies that
    /// turn out to be HTML error pages. Returns the last error once the
    /// retries are exhausted.
    pub async fn fetch_with_retry(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 0;

        loop {
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < self.max_retries => {
                    let delay_secs = 2u64.pow(attempt);
                    warn!(
                        url = %url,
                        retry = attempt,
                        delay_secs = delay_secs,
                        error = %e,
                        "Fetch failed, backing off"
                    );
                    tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let request = match &self.proxy_base {
            // Same-origin indirection: the proxy re-fetches the target
            // server-side, dodging CORS and anti-bot blocking.
            Some(base) => self
                .client
                .get(format!("{}/api/proxy", base.trim_end_matches('/')))
                .query(&[("url", url)]),
            None => self.client.get(url),
        };

        let response = tokio::time::timeout(
            self.timeout,
            request.header(reqwest::header::ACCEPT, ACCEPT).send(),
        )
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        let text = response.text().await.map_err(FetchError::Network)?;

        if is_html_error_page(&text) {
            return Err(FetchError::NotAFeed);
        }

        // In proxy mode a failed upstream fetch arrives as a JSON error body.
        if self.proxy_base.is_some() && text.contains("\"error\"") {
            if let Ok(body) = serde_json::from_str::<ProxyErrorBody>(&text) {
                return Err(FetchError::Proxy(body.error));
            }
        }

        Ok(text)
    }

    async fn record_success(&self, source_id: &str, articles_count: usize) {
        let mut stats = self.stats.write().await;
        stats.insert(
            source_id.to_string(),
            SourceStats {
                source_id: source_id.to_string(),
                articles_count,
                last_fetch: Utc::now(),
                status: FetchStatus::Success,
                error: None,
            },
        );
    }

    async fn record_error(&self, source_id: &str, err: &FetchError) {
        error!(source = %source_id, error = %err, "Failed to fetch feed");

        {
            let mut errors = self.errors.write().await;
            errors.insert(
                0,
                FeedError {
                    source_id: source_id.to_string(),
                    error: err.to_string(),
                    timestamp: Utc::now(),
                },
            );
            errors.truncate(MAX_LOGGED_ERRORS);
        }

        let mut stats = self.stats.write().await;
        stats.insert(
            source_id.to_string(),
            SourceStats {
                source_id: source_id.to_string(),
                articles_count: 0,
                last_fetch: Utc::now(),
                status: FetchStatus::Error,
                error: Some(err.to_string()),
            },
        );
    }

    pub async fn stats(&self) -> Vec<SourceStats> {
        let mut stats: Vec<SourceStats> = self.stats.read().await.values().cloned().collect();
        stats.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        stats
    }

    pub async fn errors(&self) -> Vec<FeedError> {
        self.errors.read().await.clone()
    }

    pub async fn clear_errors(&self) {
        self.errors.write().await.clear();
    }
}

/// Loose feed sniffing over the first markers in the body. Matches what the
/// proxy endpoint validates before passing content through.
pub fn is_valid_feed(content: &str) -> bool {
    let normalized = content.to_lowercase();
    normalized.contains("<rss")
        || normalized.contains("<feed")
        || normalized.contains("<?xml")
        || normalized.contains("<rdf:rdf")
}

/// Hosts behind bot protection tend to answer with an HTML error page and a
/// 200 status, so a status check alone is not enough.
fn is_html_error_page(content: &str) -> bool {
    let normalized = content.to_lowercase();
    normalized.contains("<!doctype html")
        && !normalized.contains("<rss")
        && !normalized.contains("<feed")
}
