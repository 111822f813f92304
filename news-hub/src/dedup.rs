use crate::state::SeenStore;
use crate::types::Article;
use std::collections::HashSet;
use tracing::{debug, info};

/// Collapse articles with equal ids, keeping the first one seen. Order of
/// the survivors is preserved, so applying this twice changes nothing.
pub fn dedupe(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::with_capacity(articles.len());
    articles
        .into_iter()
        .filter(|article| {
            let fresh = seen.insert(article.id.clone());
            if !fresh {
                debug!("Removing duplicate article: {} ({})", article.title, article.id);
            }
            fresh
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupOutcome {
    pub articles: Vec<Article>,
    pub duplicates: usize,
    pub suppressed: usize,
}

/// In-run dedup plus optional suppression of ids emitted by earlier runs.
pub struct Deduplicator {
    previously_seen: HashSet<String>,
    suppress_seen: bool,
}

impl Deduplicator {
    pub fn new(store: &SeenStore, suppress_seen: bool) -> Self {
        Self {
            previously_seen: store.ids().cloned().collect(),
            suppress_seen,
        }
    }

    /// No cross-run memory; only in-run duplicates are removed.
    pub fn in_run_only() -> Self {
        Self {
            previously_seen: HashSet::new(),
            suppress_seen: false,
        }
    }

    pub fn run(&self, articles: Vec<Article>) -> DedupOutcome {
        let before = articles.len();
        let unique = dedupe(articles);
        let duplicates = before - unique.len();

        let (articles, suppressed) = if self.suppress_seen && !self.previously_seen.is_empty() {
            let count = unique.len();
            let kept: Vec<Article> = unique
                .into_iter()
                .filter(|a| !self.previously_seen.contains(&a.id))
                .collect();
            let suppressed = count - kept.len();
            (kept, suppressed)
        } else {
            (unique, 0)
        };

        if duplicates > 0 || suppressed > 0 {
            info!(
                "Dedup removed {} in-run duplicates and suppressed {} previously published articles",
                duplicates, suppressed
            );
        }

        DedupOutcome {
            articles,
            duplicates,
            suppressed,
        }
    }
}
