use crate::types::{Article, EdinetDocument, NormalizationError, RawItem, RssEntry, SourceRef};
use crate::utils::{html, text};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use std::collections::BTreeSet;
use url::Url;
use xxhash_rust::xxh3::xxh3_64;

const EDINET_DOCUMENT_BASE: &str = "https://disclosure.edinet-fsa.go.jp/api/v2/documents";
const EDINET_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"];

/// Converts raw per-source records into `Article`s.
#[derive(Debug, Clone)]
pub struct Normalizer {
    summary_max_chars: usize,
    /// Offset in which sources without zone information report local times.
    local_offset: FixedOffset,
}

impl Normalizer {
    pub fn new(summary_max_chars: usize, local_offset: FixedOffset) -> Self {
        Self {
            summary_max_chars,
            local_offset,
        }
    }

    pub fn normalize(&self, raw: RawItem, source: &SourceRef) -> Result<Article, NormalizationError> {
        match raw {
            RawItem::Rss(entry) => self.normalize_rss(entry, source),
            RawItem::Edinet(doc) => self.normalize_edinet(doc, source),
        }
    }

    fn normalize_rss(&self, entry: RssEntry, source: &SourceRef) -> Result<Article, NormalizationError> {
        let title = clean_text(entry.title.as_deref().unwrap_or(""));
        if title.is_empty() {
            return Err(NormalizationError::MissingTitle);
        }
        let published_at = entry.published_at.ok_or(NormalizationError::MissingTimestamp)?;
        let url = entry.link.as_deref().and_then(canonical_url);

        let body = entry
            .summary
            .as_deref()
            .map(|s| text::collapse_whitespace(&html::strip_tags(s)))
            .unwrap_or_default();
        let summary = if body.is_empty() { title.clone() } else { body };

        Ok(self.build(title, url, published_at, source, &summary))
    }

    fn normalize_edinet(&self, doc: EdinetDocument, source: &SourceRef) -> Result<Article, NormalizationError> {
        let description = clean_text(doc.doc_description.as_deref().unwrap_or(""));
        let filer = clean_text(doc.filer_name.as_deref().unwrap_or(""));
        let title = match (filer.is_empty(), description.is_empty()) {
            (_, true) if filer.is_empty() => return Err(NormalizationError::MissingTitle),
            (true, _) => description.clone(),
            (false, true) => filer.clone(),
            (false, false) => format!("{} {}", filer, description),
        };

        let raw_ts = doc.submit_date_time.as_deref().map(str::trim).unwrap_or("");
        if raw_ts.is_empty() {
            return Err(NormalizationError::MissingTimestamp);
        }
        let published_at = parse_local_timestamp(raw_ts, self.local_offset)
            .ok_or_else(|| NormalizationError::InvalidTimestamp(raw_ts.to_string()))?;

        let url = doc
            .doc_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .and_then(|id| canonical_url(&format!("{}/{}?type=2", EDINET_DOCUMENT_BASE, id)));

        let sec_code = clean_text(doc.sec_code.as_deref().unwrap_or(""));
        let summary = if sec_code.is_empty() {
            format!("EDINET filing: {}", description)
        } else {
            format!("EDINET filing: {} / securities code: {}", description, sec_code)
        };

        Ok(self.build(title, url, published_at, source, &summary))
    }

    fn build(
        &self,
        title: String,
        url: Option<String>,
        published_at: DateTime<Utc>,
        source: &SourceRef,
        summary: &str,
    ) -> Article {
        Article {
            id: article_id(url.as_deref(), &title, published_at),
            title,
            url,
            published_at,
            source: source.clone(),
            summary: text::truncate_chars(summary, self.summary_max_chars),
            topics: BTreeSet::new(),
        }
    }
}

fn clean_text(raw: &str) -> String {
    text::collapse_whitespace(raw)
}

fn parse_local_timestamp(raw: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    EDINET_TIMESTAMP_FORMATS.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(raw, fmt)
            .ok()
            .and_then(|naive| offset.from_local_datetime(&naive).single())
            .map(|dt| dt.with_timezone(&Utc))
    })
}

/// Normalized form of an http(s) link, or `None` if the link is unusable.
///
/// Drops the fragment and `utm_*` tracking parameters and trims a trailing
/// slash from non-root paths. Scheme and host are lowercased by the parser.
pub fn canonical_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if !(url.scheme() == "http" || url.scheme() == "https") || url.host().is_none() {
        return None;
    }
    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !k.starts_with("utm_"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    Some(url.to_string())
}

/// Stable identity: hash of the canonical URL, or of title and timestamp
/// when there is no usable link. Collisions between distinct items are
/// accepted as rare; the later item is dropped as a duplicate.
pub fn article_id(canonical_url: Option<&str>, title: &str, published_at: DateTime<Utc>) -> String {
    let key = match canonical_url {
        Some(url) => format!("url:{}", url),
        None => format!("title:{}|{}", title, published_at.to_rfc3339()),
    };
    format!("{:016x}", xxh3_64(key.as_bytes()))
}
