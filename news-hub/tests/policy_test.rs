mod common;

use chrono::{FixedOffset, Utc};
use common::{article, init_tracing, ts};
use news_hub::config::SiteSettings;
use news_hub::policy::{round_down, PolicyInput};
use news_hub::render::ENTRY_PAGE;
use news_hub::{apply_policy, render, Article, FilteredSiteData, HubConfig, PublicPolicy};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

const NEWS: &str = r#"
topic_packs:
  investing:
    enabled: true
    sources:
      - https://feeds.example.com/investing.xml
    match_rules:
      - kind: all
  world:
    enabled: false
    sources:
      - https://feeds.example.com/world.xml
"#;

fn jst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap()
}

fn filtered(config: &HubConfig, articles: &[Article]) -> FilteredSiteData {
    apply_policy(PolicyInput {
        articles,
        policy: &config.policy,
        site: &config.site,
        display_offset: jst(),
        packs: &config.packs,
        sources: &[],
        generated_at: Utc::now(),
    })
}

fn tagged(mut a: Article, pack: &str) -> Article {
    a.topics = BTreeSet::from([pack.to_string()]);
    a
}

#[test]
fn test_hidden_asset_mix_never_reaches_output() {
    init_tracing();

    let public = r#"
public_site:
  show_asset_mix: false
  asset_mix_rounding: 0.05
  asset_mix:
    equity: 0.73
    bond: 0.17
"#;
    let config = HubConfig::from_yaml(NEWS, Some(public), None).unwrap();
    let articles = vec![tagged(article("https://a.example.com/1", "Headline", "inv", ts(14, 0)), "investing")];

    let data = filtered(&config, &articles);
    assert!(data.asset_mix.is_none());

    let json = serde_json::to_string(&data).unwrap();
    assert!(!json.contains("equity"));
    assert!(!json.contains("0.73"));

    for (path, bytes) in render(&data).files() {
        let page = String::from_utf8_lossy(bytes);
        assert!(!page.contains("equity"), "asset mix leaked into {}", path);
        assert!(!page.contains("Asset mix"), "asset mix block rendered in {}", path);
    }
}

#[test]
fn test_missing_public_config_hides_asset_mix() {
    let config = HubConfig::from_yaml(NEWS, None, None).unwrap();
    assert_eq!(config.policy, PublicPolicy::default());
    assert!(filtered(&config, &[]).asset_mix.is_none());
}

#[test]
fn test_shown_asset_mix_is_rounded_down() {
    init_tracing();

    let public = r#"
public_site:
  show_asset_mix: true
  asset_mix_rounding: 0.05
  asset_mix:
    equity: 0.73
    bond: 0.15
    cash: 0.02
"#;
    let config = HubConfig::from_yaml(NEWS, Some(public), None).unwrap();
    let data = filtered(&config, &[]);

    let block = data.asset_mix.as_ref().expect("asset mix should be shown");
    let values: BTreeMap<&str, f64> = block
        .entries
        .iter()
        .map(|e| (e.category.as_str(), e.fraction))
        .collect();
    assert!((values["equity"] - 0.70).abs() < 1e-9);
    assert!((values["bond"] - 0.15).abs() < 1e-9);
    assert!(values["cash"].abs() < 1e-9);

    let artifact = render(&data);
    let index = artifact.get_str(ENTRY_PAGE).unwrap();
    assert!(index.contains("equity: 0.70"));
    assert!(index.contains("bond: 0.15"));
    assert!(index.contains("cash: 0.00"));
    assert!(!index.contains("0.73"));
}

#[test]
fn test_pages_are_newest_first_and_capped() {
    let config = HubConfig::from_yaml(NEWS, None, None).unwrap();
    let site = SiteSettings::default();

    let articles: Vec<Article> = (0..40)
        .map(|i| {
            let a = article(
                &format!("https://a.example.com/{}", i),
                &format!("Story {}", i),
                "inv",
                ts(1 + (i % 28) as u32, (i % 24) as u32),
            );
            tagged(a, "investing")
        })
        .collect();

    let data = filtered(&config, &articles);
    assert_eq!(data.entry.len(), site.max_items_per_page);
    for pair in data.entry.windows(2) {
        assert!(pair[0].published_at >= pair[1].published_at);
    }

    assert_eq!(data.packs.len(), 1, "disabled packs get no section");
    assert_eq!(data.packs[0].name, "investing");
    assert_eq!(data.packs[0].articles.len(), site.max_items_per_page);

    // Only what reached a page counts as published
    assert_eq!(data.published_ids.len(), site.max_items_per_page);
    for public in &data.entry {
        let id = articles.iter().find(|a| a.title == public.title).map(|a| a.id.clone()).unwrap();
        assert!(data.published_ids.contains(&id));
    }
    let json = serde_json::to_string(&data).unwrap();
    assert!(!json.contains("published_ids"));
}

#[test]
fn test_public_projection_drops_internal_fields() {
    let config = HubConfig::from_yaml(NEWS, None, None).unwrap();
    let articles = vec![tagged(article("https://a.example.com/1", "Headline", "inv", ts(14, 0)), "investing")];
    let data = filtered(&config, &articles);

    let value = serde_json::to_value(&data.entry[0]).unwrap();
    let keys: BTreeSet<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        BTreeSet::from(["title", "url", "summary", "published_at", "source"])
    );
}

#[test]
fn test_round_down_edges() {
    assert_eq!(round_down(0.0, 0.05), 0.0);
    assert_eq!(round_down(-0.3, 0.05), 0.0);
    assert_eq!(round_down(0.5, 0.0), 0.0);
    assert_eq!(round_down(f64::NAN, 0.05), 0.0);
    assert!((round_down(1.0, 0.05) - 1.0).abs() < 1e-9);
    assert!((round_down(0.049, 0.05)).abs() < 1e-9);
}

#[test]
fn test_round_down_never_rounds_up_near_a_multiple() {
    let value = 0.149999999999;
    let rounded = round_down(value, 0.05);
    assert!(rounded <= value, "{} exceeds {}", rounded, value);
    assert!((rounded - 0.10).abs() < 1e-9);

    // Exact multiples survive binary representation error
    assert_eq!(round_down(0.15, 0.05), 0.15);
    assert_eq!(round_down(0.7, 0.1), 0.7);
}

proptest! {
    #[test]
    fn round_down_never_exceeds_value(value in 0.0f64..=1.0, step in prop::sample::select(vec![0.01, 0.05, 0.1, 0.25])) {
        let rounded = round_down(value, step);
        prop_assert!(rounded <= value);
        prop_assert!(value - rounded < step);
        let multiples = rounded / step;
        prop_assert!((multiples - multiples.round()).abs() < 1e-6);
    }
}
