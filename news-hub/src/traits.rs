use crate::types::{FetchOutcome, SourceFetchError, SourceRef};
use async_trait::async_trait;

/// One external source of news items (RSS feed, filings API, ...).
///
/// Adapters are stateless across runs and make a single bounded attempt per
/// call. A source that cannot run (e.g. missing credentials) reports
/// `FetchOutcome::Skipped` instead of an error.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> &SourceRef;

    fn source_id(&self) -> &str {
        &self.source().id
    }

    fn source_name(&self) -> &str {
        &self.source().name
    }

    async fn fetch(&self) -> Result<FetchOutcome, SourceFetchError>;
}
