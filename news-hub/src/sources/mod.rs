pub mod edinet;
pub mod rss_feed;

pub use edinet::EdinetSource;
pub use rss_feed::RssFeedSource;

use crate::config::{SourceConfig, SourceSettings};
use crate::fetcher::Fetcher;
use crate::traits::SourceAdapter;
use chrono::NaiveDate;
use std::sync::Arc;

/// Build the adapter for one configured source. `run_date` is the local
/// calendar date used by date-keyed APIs.
pub fn build_adapter(
    config: &SourceConfig,
    fetcher: Arc<Fetcher>,
    run_date: NaiveDate,
) -> Box<dyn SourceAdapter> {
    match &config.settings {
        SourceSettings::Rss { url, max_items } => Box::new(RssFeedSource::new(
            config.source.clone(),
            url.clone(),
            *max_items,
            fetcher,
        )),
        SourceSettings::Edinet {
            endpoint,
            credential_env,
            include_doc_type_codes,
            max_items,
        } => Box::new(
            EdinetSource::new(
                config.source.clone(),
                endpoint.clone(),
                EdinetSource::credential_from_env(credential_env),
                run_date,
                fetcher,
            )
            .with_doc_type_codes(include_doc_type_codes.clone())
            .with_max_items(*max_items),
        ),
    }
}
