use crate::config::{MatchRule, TopicPack};
use crate::types::{Article, TopicTag};
use std::collections::BTreeSet;
use tracing::debug;

impl MatchRule {
    pub fn matches(&self, article: &Article) -> bool {
        match self {
            MatchRule::Source { ids } => ids.iter().any(|id| *id == article.source.id),
            MatchRule::Keyword { any } => {
                let title = article.title.to_lowercase();
                any.iter().any(|kw| title.contains(&kw.to_lowercase()))
            }
            MatchRule::All => true,
        }
    }
}

/// Whether `article` belongs in `pack`. Rules are tried in configured order
/// and the first hit wins; a pack without rules takes its own sources.
pub fn pack_matches(pack: &TopicPack, article: &Article) -> bool {
    if pack.match_rules.is_empty() {
        return pack.has_source(&article.source.id);
    }
    pack.match_rules.iter().any(|rule| rule.matches(article))
}

/// Tags for every enabled pack the article matches. Disabled packs are
/// never consulted.
pub fn route(article: &Article, packs: &[TopicPack]) -> BTreeSet<TopicTag> {
    packs
        .iter()
        .filter(|pack| pack.enabled && pack_matches(pack, article))
        .map(|pack| pack.name.clone())
        .collect()
}

/// Tag all articles, dropping those that match no enabled pack. Returns the
/// routed articles and the number dropped.
pub fn route_all(articles: Vec<Article>, packs: &[TopicPack]) -> (Vec<Article>, usize) {
    let mut dropped = 0;
    let routed = articles
        .into_iter()
        .filter_map(|mut article| {
            let topics = route(&article, packs);
            if topics.is_empty() {
                debug!("Dropping unrouted article: {} ({})", article.title, article.id);
                dropped += 1;
                return None;
            }
            article.topics = topics;
            Some(article)
        })
        .collect();
    (routed, dropped)
}
