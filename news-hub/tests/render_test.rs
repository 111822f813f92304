mod common;

use chrono::{FixedOffset, TimeZone, Utc};
use common::{article, init_tracing, source_ref, ts};
use news_hub::policy::{PackSection, PublicArticle, PolicyInput};
use news_hub::render::{pack_page_path, ENTRY_PAGE, NO_UPDATES, STATUS_PAGE, STYLESHEET};
use news_hub::{
    apply_policy, render, FilteredSiteData, HubConfig, SourceKind, SourceReport, SourceStatus,
};
use std::collections::BTreeSet;
use std::fs;

const NEWS: &str = r#"
topic_packs:
  investing:
    enabled: true
    title: Investing
    sources:
      - https://feeds.example.com/investing.xml
    match_rules:
      - kind: all
  filings:
    enabled: true
    title: Filings
    sources:
      - https://feeds.example.com/filings.xml
"#;

fn site_data(generated_hour: u32) -> FilteredSiteData {
    let config = HubConfig::from_yaml(NEWS, None, None).unwrap();
    let mut a = article("https://example.com/1", "Markets open flat", "inv", ts(14, 0));
    a.topics = BTreeSet::from(["investing".to_string()]);
    let sources = vec![
        SourceReport {
            source: source_ref("inv", SourceKind::Rss),
            status: SourceStatus::Ok { items: 1 },
        },
        SourceReport {
            source: source_ref("edinet", SourceKind::Edinet),
            status: SourceStatus::Skipped {
                reason: "API credential not set".to_string(),
            },
        },
    ];
    apply_policy(PolicyInput {
        articles: &[a],
        policy: &config.policy,
        site: &config.site,
        display_offset: FixedOffset::east_opt(9 * 3600).unwrap(),
        packs: &config.packs,
        sources: &sources,
        generated_at: Utc.with_ymd_and_hms(2024, 6, 14, generated_hour, 0, 0).unwrap(),
    })
}

#[test]
fn test_site_layout() {
    init_tracing();
    let artifact = render(&site_data(0));

    let filings_page = pack_page_path("filings");
    let investing_page = pack_page_path("investing");
    let paths: Vec<&str> = artifact.paths().collect();
    assert_eq!(
        paths,
        vec![STYLESHEET, ENTRY_PAGE, filings_page.as_str(), investing_page.as_str(), STATUS_PAGE]
    );

    let index = artifact.get_str(ENTRY_PAGE).unwrap();
    assert!(index.contains("Markets open flat"));
    assert!(index.contains("href=\"packs/investing.html\""));
    assert!(index.contains("2024-06-14 09:00 UTC+09:00"));

    let pack = artifact.get_str(&pack_page_path("investing")).unwrap();
    assert!(pack.contains("href=\"../index.html\""));
    assert!(pack.contains("href=\"https://example.com/1\""));

    let filings = artifact.get_str(&pack_page_path("filings")).unwrap();
    assert!(filings.contains(NO_UPDATES));
}

#[test]
fn test_status_page_lists_sources() {
    let artifact = render(&site_data(0));
    let status = artifact.get_str(STATUS_PAGE).unwrap();
    assert!(status.contains("[OK] INV (rss) - 1 items"));
    assert!(status.contains("[SKIP] EDINET (edinet) - API credential not set"));
    assert!(status.contains("id=\"generated-at\""));
}

#[test]
fn test_rendering_is_deterministic_apart_from_status() {
    let first = render(&site_data(0));
    let again = render(&site_data(0));
    let later = render(&site_data(5));

    assert_eq!(first, again);

    let stable_first: Vec<_> = first.stable_files().collect();
    let stable_later: Vec<_> = later.stable_files().collect();
    assert_eq!(stable_first, stable_later);
    assert_ne!(first.get(STATUS_PAGE), later.get(STATUS_PAGE));
}

#[test]
fn test_untrusted_text_is_escaped() {
    let mut data = site_data(0);
    let hostile = PublicArticle {
        title: "<script>alert('x')</script>".to_string(),
        url: Some("javascript:alert(1)".to_string()),
        summary: "Tom & Jerry \"quoted\"".to_string(),
        published_at: ts(14, 1),
        source: "<b>feed</b>".to_string(),
    };
    data.packs = vec![PackSection {
        name: "investing".to_string(),
        title: "Investing".to_string(),
        articles: vec![hostile],
    }];

    let artifact = render(&data);
    let page = artifact.get_str(&pack_page_path("investing")).unwrap();
    assert!(!page.contains("<script>"));
    assert!(page.contains("&lt;script&gt;"));
    assert!(page.contains("Tom &amp; Jerry &quot;quoted&quot;"));
    assert!(!page.contains("javascript:"));
    assert!(page.contains("&lt;b&gt;feed&lt;/b&gt;"));
}

#[test]
fn test_publish_replaces_existing_tree() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("site");

    fs::create_dir_all(out.join("packs")).unwrap();
    fs::write(out.join("packs/retired.html"), "old pack").unwrap();

    let artifact = render(&site_data(0));
    artifact.publish(&out).unwrap();
    artifact.publish(&out).unwrap();

    assert!(!out.join("packs/retired.html").exists());
    for (path, bytes) in artifact.files() {
        assert_eq!(fs::read(out.join(path)).unwrap(), bytes, "{} differs", path);
    }

    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(leftovers, vec!["site".to_string()]);
}

#[test]
fn test_publish_resolves_parent_references() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let site = dir.path().join("site");
    fs::create_dir_all(site.join("nested")).unwrap();
    fs::write(site.join("stale.html"), "old").unwrap();

    let artifact = render(&site_data(0));
    artifact.publish(&site.join("nested").join("..")).unwrap();

    assert!(site.join(ENTRY_PAGE).exists());
    assert!(!site.join("stale.html").exists());
    assert!(!site.join("nested").exists());

    let mut leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    leftovers.sort();
    assert_eq!(leftovers, vec!["site".to_string()]);
}

#[test]
fn test_publish_refuses_filesystem_root() {
    let artifact = render(&site_data(0));
    assert!(artifact.publish(std::path::Path::new("/")).is_err());
}
