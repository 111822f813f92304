#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use news_hub::normalizer::{article_id, canonical_url};
use news_hub::{Article, SourceKind, SourceRef};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Once;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Minimal RSS 2.0 document. Each item is (title, link, RFC 2822 date).
pub fn rss_feed(items: &[(&str, &str, &str)]) -> String {
    let mut body = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\"><channel>\
         <title>Test Feed</title><link>https://example.com/</link><description>test</description>\n",
    );
    for (title, link, date) in items {
        body.push_str(&format!(
            "<item><title>{}</title><link>{}</link><pubDate>{}</pubDate>\
             <description>&lt;p&gt;Summary of {}&lt;/p&gt;</description></item>\n",
            title, link, date, title
        ));
    }
    body.push_str("</channel></rss>\n");
    body
}

pub fn source_ref(id: &str, kind: SourceKind) -> SourceRef {
    SourceRef {
        id: id.to_string(),
        name: id.to_uppercase(),
        kind,
    }
}

pub fn ts(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap()
}

pub fn article(link: &str, title: &str, source_id: &str, published_at: DateTime<Utc>) -> Article {
    let url = canonical_url(link);
    Article {
        id: article_id(url.as_deref(), title, published_at),
        title: title.to_string(),
        url,
        published_at,
        source: source_ref(source_id, SourceKind::Rss),
        summary: format!("Summary of {}", title),
        topics: BTreeSet::new(),
    }
}

pub fn write_config(dir: &Path, news: &str, public: Option<&str>) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("news.yaml"), news).unwrap();
    if let Some(public) = public {
        fs::write(dir.join("public.yaml"), public).unwrap();
    }
}
