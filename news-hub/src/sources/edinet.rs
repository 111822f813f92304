use crate::fetcher::Fetcher;
use crate::traits::SourceAdapter;
use crate::types::{EdinetResponse, FetchOutcome, RawItem, SourceBatch, SourceFetchError, SourceRef};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::env;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// EDINET documents-list API (statutory filings). Needs a subscription key.
pub struct EdinetSource {
    source: SourceRef,
    endpoint: String,
    credential: Option<String>,
    include_doc_type_codes: BTreeSet<String>,
    max_items: usize,
    date: NaiveDate,
    fetcher: Arc<Fetcher>,
}

impl EdinetSource {
    pub fn new(
        source: SourceRef,
        endpoint: String,
        credential: Option<String>,
        date: NaiveDate,
        fetcher: Arc<Fetcher>,
    ) -> Self {
        Self {
            source,
            endpoint,
            credential: credential.filter(|key| !key.trim().is_empty()),
            include_doc_type_codes: BTreeSet::new(),
            max_items: 400,
            date,
            fetcher,
        }
    }

    pub fn with_doc_type_codes(mut self, codes: BTreeSet<String>) -> Self {
        self.include_doc_type_codes = codes;
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Empty or whitespace-only values count as unset.
    pub fn credential_from_env(var: &str) -> Option<String> {
        env::var(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn request_url(&self, key: &str) -> Result<Url, SourceFetchError> {
        let date = self.date.format("%Y-%m-%d").to_string();
        let url = Url::parse_with_params(
            &self.endpoint,
            &[("date", date.as_str()), ("type", "2"), ("Subscription-Key", key)],
        )?;
        Ok(url)
    }
}

#[async_trait]
impl SourceAdapter for EdinetSource {
    fn source(&self) -> &SourceRef {
        &self.source
    }

    async fn fetch(&self) -> Result<FetchOutcome, SourceFetchError> {
        let Some(key) = self.credential.as_deref() else {
            info!("Skipping {}: no API credential configured", self.source.name);
            return Ok(FetchOutcome::Skipped("API credential not set".to_string()));
        };

        let url = self.request_url(key)?;
        let response: EdinetResponse = self.fetcher.get_json(url).await?;
        let total = response.results.len();

        let items: Vec<RawItem> = response
            .results
            .into_iter()
            .take(self.max_items)
            .filter(|doc| {
                let code = doc.doc_type_code.as_deref().unwrap_or("");
                // Rows without a code are kept; the filter only excludes known codes
                self.include_doc_type_codes.is_empty()
                    || code.is_empty()
                    || self.include_doc_type_codes.contains(code)
            })
            .map(RawItem::Edinet)
            .collect();

        debug!("EDINET returned {} documents for {}, kept {}", total, self.date, items.len());
        info!("Pulled {} filings from {}", items.len(), self.source.name);

        Ok(FetchOutcome::Fetched(SourceBatch {
            items,
            warnings: Vec::new(),
        }))
    }
}
