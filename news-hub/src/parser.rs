use crate::types::{RssEntry, SourceFetchError};
use chrono::Utc;
use feed_rs::parser;
use tracing::debug;

/// Turns RSS/Atom documents into loosely-typed entries.
pub struct FeedParser {
    max_items: usize,
}

impl FeedParser {
    pub fn new(max_items: usize) -> Self {
        Self { max_items }
    }

    pub fn parse_feed(&self, content: &str) -> Result<Vec<RssEntry>, SourceFetchError> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content.as_bytes())
            .map_err(|e| SourceFetchError::Parse(format!("failed to parse feed: {}", e)))?;

        let total = feed.entries.len();
        let entries: Vec<RssEntry> = feed
            .entries
            .into_iter()
            .take(self.max_items)
            .map(Self::parse_entry)
            .collect();

        debug!("Parsed feed with {} entries (kept {})", total, entries.len());
        Ok(entries)
    }

    fn parse_entry(entry: feed_rs::model::Entry) -> RssEntry {
        let title = entry.title.map(|t| t.content);
        let link = entry.links.first().map(|l| l.href.clone());

        // Prefer the summary; fall back to content. Either way only a
        // summary is derived from it downstream.
        let summary = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body));

        let published_at = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.with_timezone(&Utc));

        RssEntry {
            title,
            link,
            published_at,
            summary,
        }
    }

    /// Cheap sniff used to label empty-but-valid documents in warnings.
    pub fn is_valid_feed_content(content: &str) -> bool {
        let content_lower = content.to_lowercase();
        content_lower.contains("<rss") || content_lower.contains("<feed") || content_lower.contains("<rdf")
    }
}
