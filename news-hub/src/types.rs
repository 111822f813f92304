use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::config::ConfigError;

/// Name of the topic pack an article was routed to.
pub type TopicTag = String;

/// Which adapter produced an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Rss,
    Edinet,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Rss => "rss",
            SourceKind::Edinet => "edinet",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a configured source, carried by every article it yields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: String,
    pub name: String,
    pub kind: SourceKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub source: SourceRef,
    pub summary: String,
    pub topics: BTreeSet<TopicTag>,
}

/// Per-source record shapes. Nothing past the normalizer sees these.
#[derive(Debug, Clone)]
pub enum RawItem {
    Rss(RssEntry),
    Edinet(EdinetDocument),
}

impl RawItem {
    pub fn kind(&self) -> SourceKind {
        match self {
            RawItem::Rss(_) => SourceKind::Rss,
            RawItem::Edinet(_) => SourceKind::Edinet,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RssEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

/// One row of the EDINET documents list response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdinetDocument {
    #[serde(rename = "docID")]
    pub doc_id: Option<String>,
    pub doc_description: Option<String>,
    pub filer_name: Option<String>,
    pub sec_code: Option<String>,
    pub submit_date_time: Option<String>,
    pub doc_type_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EdinetResponse {
    #[serde(default)]
    pub results: Vec<EdinetDocument>,
}

/// Items from one successful fetch, plus any non-fatal warnings (e.g. a
/// malformed feed that produced nothing).
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
    pub items: Vec<RawItem>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Fetched(SourceBatch),
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Ok { items: usize },
    Skipped { reason: String },
    Failed { error: String },
}

impl SourceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SourceStatus::Ok { .. } => "OK",
            SourceStatus::Skipped { .. } => "SKIP",
            SourceStatus::Failed { .. } => "NG",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: SourceRef,
    pub status: SourceStatus,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_feed_size_mb: usize,
    pub follow_redirects: bool,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "NewsHub/0.1 (+static digest builder)".to_string(),
            timeout_seconds: 20,
            max_feed_size_mb: 10,
            follow_redirects: true,
            max_redirects: 5,
        }
    }
}

/// One source's network or decode failure. Recovered at the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum SourceFetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {endpoint}")]
    Status { status: u16, endpoint: String },

    #[error("response exceeds limit: {size_bytes} bytes")]
    TooLarge { size_bytes: u64 },

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

/// A single malformed item. The item is dropped, the run continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizationError {
    #[error("item has no title")]
    MissingTitle,

    #[error("item has no timestamp")]
    MissingTimestamp,

    #[error("unparsable timestamp: {0:?}")]
    InvalidTimestamp(String),
}

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("run exceeded {seconds}s ceiling ({completed_sources} sources finished, {pending_sources} pending)")]
    RunTimeout {
        seconds: u64,
        completed_sources: usize,
        pending_sources: usize,
    },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HubError>;
