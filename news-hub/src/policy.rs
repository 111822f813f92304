//! The publication boundary. Everything that reaches the renderer is built
//! here as a reduced projection; nothing else may add exposed fields.

use crate::config::{PublicPolicy, SiteSettings, TopicPack};
use crate::types::{Article, SourceReport, SourceStatus};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;

const STEP_TOLERANCE: f64 = 1e-9;

/// The only article fields that may be published.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicArticle {
    pub title: String,
    pub url: Option<String>,
    pub summary: String,
    pub published_at: DateTime<Utc>,
    pub source: String,
}

impl From<&Article> for PublicArticle {
    fn from(article: &Article) -> Self {
        Self {
            title: article.title.clone(),
            url: article.url.clone(),
            summary: article.summary.clone(),
            published_at: article.published_at,
            source: article.source.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackSection {
    pub name: String,
    pub title: String,
    pub articles: Vec<PublicArticle>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetMixEntry {
    pub category: String,
    /// Already rounded down to a multiple of the configured step.
    pub fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetMixBlock {
    pub entries: Vec<AssetMixEntry>,
    /// Digits needed to show a multiple of the rounding step exactly.
    pub decimals: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatusLine {
    pub name: String,
    pub kind: String,
    pub status: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredSiteData {
    pub site_title: String,
    pub subtitle: String,
    #[serde(skip)]
    pub display_offset: FixedOffset,
    pub entry: Vec<PublicArticle>,
    pub packs: Vec<PackSection>,
    pub asset_mix: Option<AssetMixBlock>,
    pub sources: Vec<SourceStatusLine>,
    /// Volatile; the renderer confines it to a single page.
    pub generated_at: DateTime<Utc>,
    /// Ids of every article placed on some page. Recorded in the dedup
    /// state after publishing; never rendered.
    #[serde(skip)]
    pub published_ids: BTreeSet<String>,
}

pub struct PolicyInput<'a> {
    pub articles: &'a [Article],
    pub policy: &'a PublicPolicy,
    pub site: &'a SiteSettings,
    pub display_offset: FixedOffset,
    pub packs: &'a [TopicPack],
    pub sources: &'a [SourceReport],
    pub generated_at: DateTime<Utc>,
}

/// Build the publishable projection of this run's data.
pub fn apply_policy(input: PolicyInput<'_>) -> FilteredSiteData {
    let mut ordered: Vec<&Article> = input.articles.iter().collect();
    ordered.sort_by(|a, b| newest_first(a, b));
    let limit = input.site.max_items_per_page;
    let mut published_ids = BTreeSet::new();

    let entry = ordered
        .iter()
        .take(limit)
        .map(|a| {
            published_ids.insert(a.id.clone());
            PublicArticle::from(*a)
        })
        .collect();

    let packs = input
        .packs
        .iter()
        .filter(|pack| pack.enabled)
        .map(|pack| PackSection {
            name: pack.name.clone(),
            title: pack.title.clone(),
            articles: ordered
                .iter()
                .filter(|a| a.topics.contains(&pack.name))
                .take(limit)
                .map(|a| {
                    published_ids.insert(a.id.clone());
                    PublicArticle::from(*a)
                })
                .collect(),
        })
        .collect();

    FilteredSiteData {
        site_title: input.site.title.clone(),
        subtitle: input.site.subtitle.clone(),
        display_offset: input.display_offset,
        entry,
        packs,
        asset_mix: asset_mix_block(input.policy),
        sources: input.sources.iter().map(status_line).collect(),
        generated_at: input.generated_at,
        published_ids,
    }
}

fn newest_first(a: &Article, b: &Article) -> Ordering {
    b.published_at
        .cmp(&a.published_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// `None` unless the switch is on. Values are rounded before they leave
/// this function.
pub fn asset_mix_block(policy: &PublicPolicy) -> Option<AssetMixBlock> {
    if !policy.show_asset_mix {
        return None;
    }
    let step = policy.asset_mix_rounding;
    Some(AssetMixBlock {
        entries: policy
            .asset_mix
            .iter()
            .map(|(category, fraction)| AssetMixEntry {
                category: category.clone(),
                fraction: round_down(*fraction, step),
            })
            .collect(),
        decimals: decimals_for(step),
    })
}

/// Largest multiple of `step` not above `value`.
///
/// A product that lands within a few ulps above `value` is `value` itself
/// (0.15 with a step of 0.05 stays 0.15 instead of falling to 0.10).
/// Anything further above steps down, so the result never exceeds `value`.
pub fn round_down(value: f64, step: f64) -> f64 {
    if step.is_nan() || step <= 0.0 || !value.is_finite() || value <= 0.0 {
        return 0.0;
    }
    let steps = (value / step + STEP_TOLERANCE).floor();
    let rounded = steps * step;
    if rounded <= value {
        return rounded;
    }
    if rounded - value <= value * 4.0 * f64::EPSILON {
        return value;
    }
    (steps - 1.0).max(0.0) * step
}

pub fn decimals_for(step: f64) -> usize {
    let mut decimals = 0;
    let mut scaled = step;
    while decimals < 6 && (scaled - scaled.round()).abs() > 1e-6 {
        decimals += 1;
        scaled *= 10.0;
    }
    decimals.max(2)
}

fn status_line(report: &SourceReport) -> SourceStatusLine {
    let detail = match &report.status {
        SourceStatus::Ok { items } => Some(format!("{} items", items)),
        SourceStatus::Skipped { reason } => Some(reason.clone()),
        SourceStatus::Failed { error } => Some(error.clone()),
    };
    SourceStatusLine {
        name: report.source.name.clone(),
        kind: report.source.kind.to_string(),
        status: report.status.label().to_string(),
        detail,
    }
}
