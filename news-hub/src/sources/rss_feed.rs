use crate::fetcher::Fetcher;
use crate::parser::FeedParser;
use crate::traits::SourceAdapter;
use crate::types::{FetchOutcome, RawItem, SourceBatch, SourceFetchError, SourceRef};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Generic RSS/Atom feed source
pub struct RssFeedSource {
    source: SourceRef,
    url: String,
    parser: FeedParser,
    fetcher: Arc<Fetcher>,
}

impl RssFeedSource {
    pub fn new(source: SourceRef, url: String, max_items: usize, fetcher: Arc<Fetcher>) -> Self {
        Self {
            source,
            url,
            parser: FeedParser::new(max_items),
            fetcher,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SourceAdapter for RssFeedSource {
    fn source(&self) -> &SourceRef {
        &self.source
    }

    async fn fetch(&self) -> Result<FetchOutcome, SourceFetchError> {
        info!("Pulling RSS feed {} ({})", self.source.name, self.url);

        let content = self.fetcher.get_text(&self.url).await?;

        // A malformed feed costs this source its items, nothing more
        let entries = match self.parser.parse_feed(&content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Malformed feed from {}: {}", self.url, e);
                return Ok(FetchOutcome::Fetched(SourceBatch {
                    items: Vec::new(),
                    warnings: vec![format!("{}: {}", self.source.name, e)],
                }));
            }
        };

        let mut warnings = Vec::new();
        if entries.is_empty() && !FeedParser::is_valid_feed_content(&content) {
            warn!("Feed {} returned no entries and does not look like RSS/Atom", self.url);
            warnings.push(format!("{}: response does not look like a feed", self.source.name));
        }

        info!("Pulled {} entries from RSS feed {}", entries.len(), self.url);
        Ok(FetchOutcome::Fetched(SourceBatch {
            items: entries.into_iter().map(RawItem::Rss).collect(),
            warnings,
        }))
    }
}
