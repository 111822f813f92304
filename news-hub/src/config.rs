use chrono::{FixedOffset, Offset, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::types::{SourceKind, SourceRef};
use crate::utils::url::{extract_domain, is_http_url};

pub const NEWS_CONFIG_FILE: &str = "news.yaml";
pub const PUBLIC_CONFIG_FILE: &str = "public.yaml";
pub const OVERRIDES_CONFIG_FILE: &str = "overrides.yaml";
pub const DEFAULT_CREDENTIAL_ENV: &str = "EDINET_API_KEY";

const DEFAULT_RSS_MAX_ITEMS: usize = 50;
const DEFAULT_EDINET_MAX_ITEMS: usize = 400;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Presentation and limit settings from the `site:` block of `news.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    pub title: String,
    pub subtitle: String,
    pub max_items_per_page: usize,
    pub summary_max_chars: usize,
    pub display_utc_offset_hours: i32,
    pub max_concurrent_fetches: usize,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            title: "NewsHub".to_string(),
            subtitle: "Morning digest: public, general information only".to_string(),
            max_items_per_page: 30,
            summary_max_chars: 180,
            display_utc_offset_hours: 9,
            max_concurrent_fetches: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DedupSettings {
    pub suppress_seen: bool,
    pub max_seen_ids: usize,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            suppress_seen: false,
            max_seen_ids: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchRule {
    /// Article came from one of the listed source ids.
    Source { ids: Vec<String> },
    /// Title contains any of the keywords (case-insensitive).
    Keyword { any: Vec<String> },
    All,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SourceSpec {
    Rss {
        id: Option<String>,
        name: Option<String>,
        url: String,
        max_items: Option<usize>,
    },
    Edinet {
        id: Option<String>,
        name: Option<String>,
        endpoint: String,
        credential_env: Option<String>,
        #[serde(default)]
        include_doc_type_codes: Vec<String>,
        max_items: Option<usize>,
    },
}

/// A source is either a bare feed URL or a tagged map.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum SourceEntry {
    Url(String),
    Spec(SourceSpec),
}

#[derive(Debug, Clone, Deserialize)]
struct TopicPackFile {
    #[serde(default)]
    enabled: bool,
    title: Option<String>,
    #[serde(default, alias = "source_urls")]
    sources: Vec<SourceEntry>,
    #[serde(default)]
    match_rules: Vec<MatchRule>,
}

#[derive(Debug, Clone, Deserialize)]
struct NewsFile {
    #[serde(default)]
    site: SiteSettings,
    #[serde(default)]
    dedup: DedupSettings,
    topic_packs: BTreeMap<String, TopicPackFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PublicFile {
    #[serde(default)]
    public_site: PublicPolicy,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OverridesFile {
    #[serde(default)]
    enrichment: EnrichmentOverrides,
}

/// What may be published. Defaults to the most restrictive policy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PublicPolicy {
    #[serde(default)]
    pub show_asset_mix: bool,
    #[serde(default = "default_asset_mix_rounding")]
    pub asset_mix_rounding: f64,
    #[serde(default)]
    pub asset_mix: BTreeMap<String, f64>,
}

fn default_asset_mix_rounding() -> f64 {
    0.05
}

impl Default for PublicPolicy {
    fn default() -> Self {
        Self {
            show_asset_mix: false,
            asset_mix_rounding: default_asset_mix_rounding(),
            asset_mix: BTreeMap::new(),
        }
    }
}

impl PublicPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = self.asset_mix_rounding;
        if !(r.is_finite() && r > 0.0 && r <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "asset_mix_rounding must be in (0, 1], got {}",
                r
            )));
        }
        for (category, fraction) in &self.asset_mix {
            if !(fraction.is_finite() && (0.0..=1.0).contains(fraction)) {
                return Err(ConfigError::Invalid(format!(
                    "asset_mix.{} must be a fraction in [0, 1]",
                    category
                )));
            }
        }
        Ok(())
    }
}

/// Manual override settings for enrichment. Loaded and reported only.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EnrichmentOverrides {
    pub mode: Option<String>,
    pub manual_stale_days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceSettings {
    Rss {
        url: String,
        max_items: usize,
    },
    Edinet {
        endpoint: String,
        credential_env: String,
        include_doc_type_codes: BTreeSet<String>,
        max_items: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub source: SourceRef,
    pub settings: SourceSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicPack {
    pub name: String,
    pub title: String,
    pub enabled: bool,
    pub match_rules: Vec<MatchRule>,
    pub sources: Vec<SourceConfig>,
}

impl TopicPack {
    pub fn has_source(&self, source_id: &str) -> bool {
        self.sources.iter().any(|s| s.source.id == source_id)
    }
}

/// Validated configuration for one run. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct HubConfig {
    pub site: SiteSettings,
    pub dedup: DedupSettings,
    pub packs: Vec<TopicPack>,
    pub policy: PublicPolicy,
    pub overrides: EnrichmentOverrides,
}

impl HubConfig {
    /// Reads `news.yaml` (required), `public.yaml` and `overrides.yaml`
    /// (both optional) from `dir`.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let news_path = dir.join(NEWS_CONFIG_FILE);
        let news = read_required(&news_path)?;
        let public = read_optional(&dir.join(PUBLIC_CONFIG_FILE))?;
        let overrides = read_optional(&dir.join(OVERRIDES_CONFIG_FILE))?;

        let config = Self::from_yaml(&news, public.as_deref(), overrides.as_deref())?;
        info!(
            "Loaded configuration from {}: {} packs ({} enabled)",
            dir.display(),
            config.packs.len(),
            config.enabled_packs().count()
        );
        Ok(config)
    }

    pub fn from_yaml(
        news: &str,
        public: Option<&str>,
        overrides: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let news: NewsFile = parse_yaml(Path::new(NEWS_CONFIG_FILE), news)?;
        let public: PublicFile = match public {
            Some(raw) => parse_yaml(Path::new(PUBLIC_CONFIG_FILE), raw)?,
            None => {
                debug!("No {} found, asset mix stays hidden", PUBLIC_CONFIG_FILE);
                PublicFile::default()
            }
        };
        let overrides: OverridesFile = match overrides {
            Some(raw) => parse_yaml(Path::new(OVERRIDES_CONFIG_FILE), raw)?,
            None => OverridesFile::default(),
        };

        validate_site(&news.site)?;
        public.public_site.validate()?;

        let mut packs = Vec::with_capacity(news.topic_packs.len());
        for (name, pack) in news.topic_packs {
            packs.push(build_pack(name, pack)?);
        }
        check_source_consistency(&packs)?;

        if packs.iter().all(|p| !p.enabled) {
            warn!("No topic packs are enabled; the site will only contain empty pages");
        }
        debug!("Enrichment overrides: {:?}", overrides.enrichment);

        Ok(Self {
            site: news.site,
            dedup: news.dedup,
            packs,
            policy: public.public_site,
            overrides: overrides.enrichment,
        })
    }

    pub fn enabled_packs(&self) -> impl Iterator<Item = &TopicPack> {
        self.packs.iter().filter(|p| p.enabled)
    }

    /// Sources of enabled packs, each listed once in first-seen order.
    /// Sources that only appear in disabled packs are never returned.
    pub fn enabled_sources(&self) -> Vec<SourceConfig> {
        let mut seen = BTreeSet::new();
        let mut sources = Vec::new();
        for pack in self.enabled_packs() {
            for source in &pack.sources {
                if seen.insert(source.source.id.clone()) {
                    sources.push(source.clone());
                }
            }
        }
        sources
    }

    pub fn display_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.site.display_utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }
}

fn read_required(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_optional(path: &Path) -> Result<Option<String>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn parse_yaml<T: DeserializeOwned>(path: &Path, contents: &str) -> Result<T, ConfigError> {
    serde_yaml::from_str(contents).map_err(|source| ConfigError::Deserialize {
        path: path.to_path_buf(),
        source,
    })
}

fn validate_site(site: &SiteSettings) -> Result<(), ConfigError> {
    if !(-12..=14).contains(&site.display_utc_offset_hours) {
        return Err(ConfigError::Invalid(format!(
            "site.display_utc_offset_hours out of range: {}",
            site.display_utc_offset_hours
        )));
    }
    if site.max_concurrent_fetches == 0 {
        return Err(ConfigError::Invalid("site.max_concurrent_fetches must be at least 1".to_string()));
    }
    if site.max_items_per_page == 0 {
        return Err(ConfigError::Invalid("site.max_items_per_page must be at least 1".to_string()));
    }
    if site.summary_max_chars < 16 {
        return Err(ConfigError::Invalid("site.summary_max_chars must be at least 16".to_string()));
    }
    Ok(())
}

/// Pack names become output paths, so they are restricted to a slug alphabet.
fn is_slug(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

fn build_pack(name: String, pack: TopicPackFile) -> Result<TopicPack, ConfigError> {
    if !is_slug(&name) {
        return Err(ConfigError::Invalid(format!(
            "topic pack name {:?} must use only [a-z0-9_-]",
            name
        )));
    }

    let sources = pack
        .sources
        .into_iter()
        .map(|entry| build_source(&name, entry))
        .collect::<Result<Vec<_>, _>>()?;

    for rule in &pack.match_rules {
        if let MatchRule::Keyword { any } = rule {
            if any.iter().any(|k| k.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "topic pack {}: keyword rules may not contain empty keywords",
                    name
                )));
            }
        }
    }

    Ok(TopicPack {
        title: pack.title.unwrap_or_else(|| name.clone()),
        name,
        enabled: pack.enabled,
        match_rules: pack.match_rules,
        sources,
    })
}

fn build_source(pack: &str, entry: SourceEntry) -> Result<SourceConfig, ConfigError> {
    let spec = match entry {
        SourceEntry::Url(url) => SourceSpec::Rss {
            id: None,
            name: None,
            url,
            max_items: None,
        },
        SourceEntry::Spec(spec) => spec,
    };

    match spec {
        SourceSpec::Rss { id, name, url, max_items } => {
            check_url(pack, &url)?;
            Ok(SourceConfig {
                source: SourceRef {
                    id: id.unwrap_or_else(|| url.clone()),
                    name: name.unwrap_or_else(|| default_name(&url)),
                    kind: SourceKind::Rss,
                },
                settings: SourceSettings::Rss {
                    url,
                    max_items: max_items.unwrap_or(DEFAULT_RSS_MAX_ITEMS),
                },
            })
        }
        SourceSpec::Edinet {
            id,
            name,
            endpoint,
            credential_env,
            include_doc_type_codes,
            max_items,
        } => {
            check_url(pack, &endpoint)?;
            Ok(SourceConfig {
                source: SourceRef {
                    id: id.unwrap_or_else(|| "edinet".to_string()),
                    name: name.unwrap_or_else(|| "EDINET".to_string()),
                    kind: SourceKind::Edinet,
                },
                settings: SourceSettings::Edinet {
                    endpoint,
                    credential_env: credential_env.unwrap_or_else(|| DEFAULT_CREDENTIAL_ENV.to_string()),
                    include_doc_type_codes: include_doc_type_codes.into_iter().collect(),
                    max_items: max_items.unwrap_or(DEFAULT_EDINET_MAX_ITEMS),
                },
            })
        }
    }
}

fn check_url(pack: &str, url: &str) -> Result<(), ConfigError> {
    if is_http_url(url) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "topic pack {}: source URL {:?} must be an absolute http(s) URL",
            pack, url
        )))
    }
}

fn default_name(url: &str) -> String {
    extract_domain(url).unwrap_or_else(|| "RSS Feed".to_string())
}

/// A source id shared between packs must describe the same source everywhere.
fn check_source_consistency(packs: &[TopicPack]) -> Result<(), ConfigError> {
    let mut by_id: HashMap<&str, &SourceConfig> = HashMap::new();
    for pack in packs {
        for source in &pack.sources {
            match by_id.get(source.source.id.as_str()) {
                Some(existing) if *existing != source => {
                    return Err(ConfigError::Invalid(format!(
                        "source id {:?} is defined differently in topic pack {}",
                        source.source.id, pack.name
                    )));
                }
                Some(_) => {}
                None => {
                    by_id.insert(&source.source.id, source);
                }
            }
        }
    }
    Ok(())
}
