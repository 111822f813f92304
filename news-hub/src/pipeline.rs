use crate::config::HubConfig;
use crate::dedup::Deduplicator;
use crate::fetcher::Fetcher;
use crate::normalizer::Normalizer;
use crate::policy::{apply_policy, PolicyInput};
use crate::render::{render, SiteArtifact};
use crate::router::route_all;
use crate::sources::build_adapter;
use crate::state::SeenStore;
use crate::traits::SourceAdapter;
use crate::types::{
    FetchConfig, FetchOutcome, HubError, RawItem, Result, SourceFetchError, SourceRef, SourceReport,
    SourceStatus,
};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

type SourceResult = (SourceRef, std::result::Result<FetchOutcome, SourceFetchError>);

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Per-request settings; `timeout_seconds` is also the per-source ceiling.
    pub fetch: FetchConfig,
    pub run_timeout: Duration,
    /// Cross-run dedup state. `None` disables it entirely.
    pub state_path: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            run_timeout: Duration::from_secs(300),
            state_path: None,
        }
    }
}

/// Result of a run that reached the end of the pipeline. The artifact is
/// ready to publish; per-source and per-item problems are listed in
/// `sources` and `warnings`.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
    pub warnings: Vec<String>,
    pub articles: usize,
    pub dropped_items: usize,
    pub duplicates: usize,
    pub suppressed: usize,
    pub unrouted: usize,
    /// Ids that made it onto a page; only these are remembered across runs.
    pub emitted_ids: Vec<String>,
    pub artifact: SiteArtifact,
    seen: SeenStore,
}

impl RunReport {
    pub fn failed_sources(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| matches!(s.status, SourceStatus::Failed { .. }))
            .count()
    }

    pub fn log_summary(&self) {
        info!(
            "Run {} done: {} articles, {} sources ({} failed), {} dropped, {} duplicates, {} suppressed, {} unrouted",
            self.run_id,
            self.articles,
            self.sources.len(),
            self.failed_sources(),
            self.dropped_items,
            self.duplicates,
            self.suppressed,
            self.unrouted
        );
        for report in &self.sources {
            info!("  [{}] {} ({})", report.status.label(), report.source.name, report.source.kind);
        }
        for warning in &self.warnings {
            warn!("  {}", warning);
        }
    }
}

/// Sequences fetch, normalize, dedupe, route, policy filter and render for
/// one scheduled run.
pub struct Pipeline {
    config: Arc<HubConfig>,
    fetcher: Arc<Fetcher>,
    options: RunOptions,
}

impl Pipeline {
    /// Load configuration from `config_dir`. Fails before any network access.
    pub fn load(config_dir: &Path, options: RunOptions) -> Result<Self> {
        let config = HubConfig::load(config_dir)?;
        Self::new(config, options)
    }

    pub fn new(config: HubConfig, options: RunOptions) -> Result<Self> {
        let fetcher = Arc::new(Fetcher::new(options.fetch.clone())?);
        Ok(Self {
            config: Arc::new(config),
            fetcher,
            options,
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        self.run_inner(run_id)
            .instrument(info_span!("run", %run_id))
            .await
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<RunReport> {
        let deadline = Instant::now() + self.options.run_timeout;
        let started_at = Utc::now();
        let offset = self.config.display_offset();

        let seen = match &self.options.state_path {
            Some(path) => SeenStore::load(path),
            None => SeenStore::empty(),
        };

        // FETCH
        let run_date = started_at.with_timezone(&offset).date_naive();
        let adapters: Vec<Box<dyn SourceAdapter>> = self
            .config
            .enabled_sources()
            .iter()
            .map(|source| build_adapter(source, self.fetcher.clone(), run_date))
            .collect();
        info!("Fetching {} sources", adapters.len());
        let results = self.fetch_all(adapters, deadline).await?;

        let mut sources = Vec::with_capacity(results.len());
        let mut warnings = Vec::new();
        let mut raw: Vec<(SourceRef, RawItem)> = Vec::new();
        for (source, result) in results {
            let status = match result {
                Ok(FetchOutcome::Fetched(batch)) => {
                    warnings.extend(batch.warnings);
                    let items = batch.items.len();
                    raw.extend(batch.items.into_iter().map(|item| (source.clone(), item)));
                    SourceStatus::Ok { items }
                }
                Ok(FetchOutcome::Skipped(reason)) => {
                    warnings.push(format!("{} skipped: {}", source.name, reason));
                    SourceStatus::Skipped { reason }
                }
                Err(e) => {
                    warn!("Source {} failed: {}", source.name, e);
                    warnings.push(format!("{} failed: {}", source.name, e));
                    SourceStatus::Failed { error: e.to_string() }
                }
            };
            sources.push(SourceReport { source, status });
        }

        // NORMALIZE + DEDUPE
        let normalizer = Normalizer::new(self.config.site.summary_max_chars, offset);
        let mut articles = Vec::with_capacity(raw.len());
        let mut dropped_items = 0;
        for (source, item) in raw {
            match normalizer.normalize(item, &source) {
                Ok(article) => articles.push(article),
                Err(e) => {
                    warn!("Dropping item from {}: {}", source.name, e);
                    dropped_items += 1;
                }
            }
        }
        if dropped_items > 0 {
            warnings.push(format!("{} malformed items dropped", dropped_items));
        }

        let dedup = Deduplicator::new(&seen, self.config.dedup.suppress_seen).run(articles);

        // ROUTE
        let (routed, unrouted) = route_all(dedup.articles, &self.config.packs);

        // POLICY_FILTER
        let data = apply_policy(PolicyInput {
            articles: &routed,
            policy: &self.config.policy,
            site: &self.config.site,
            display_offset: offset,
            packs: &self.config.packs,
            sources: &sources,
            generated_at: started_at,
        });

        // RENDER
        let artifact = render(&data);

        if Instant::now() > deadline {
            return Err(self.timeout_error(sources.len(), 0));
        }

        Ok(RunReport {
            run_id,
            started_at,
            articles: routed.len(),
            emitted_ids: data.published_ids.iter().cloned().collect(),
            sources,
            warnings,
            dropped_items,
            duplicates: dedup.duplicates,
            suppressed: dedup.suppressed,
            unrouted,
            artifact,
            seen,
        })
    }

    /// Fetch every source, at most `max_concurrent_fetches` at a time.
    /// Results come back in source order regardless of completion order.
    async fn fetch_all(
        &self,
        adapters: Vec<Box<dyn SourceAdapter>>,
        deadline: Instant,
    ) -> Result<Vec<SourceResult>> {
        let total = adapters.len();
        let per_fetch = Duration::from_secs(self.options.fetch.timeout_seconds);

        let mut pending = stream::iter(adapters)
            .map(|adapter| async move {
                let result = match tokio::time::timeout(per_fetch, adapter.fetch()).await {
                    Ok(result) => result,
                    Err(_) => Err(SourceFetchError::Timeout {
                        seconds: per_fetch.as_secs(),
                    }),
                };
                (adapter.source().clone(), result)
            })
            .buffered(self.config.site.max_concurrent_fetches);

        let mut results = Vec::with_capacity(total);
        loop {
            match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(Some(result)) => results.push(result),
                Ok(None) => break,
                Err(_) => {
                    error!("Run ceiling reached with {}/{} sources finished", results.len(), total);
                    for (source, result) in &results {
                        match result {
                            Ok(_) => info!("  finished: {}", source.name),
                            Err(e) => info!("  failed: {} ({})", source.name, e),
                        }
                    }
                    return Err(self.timeout_error(results.len(), total - results.len()));
                }
            }
        }
        Ok(results)
    }

    fn timeout_error(&self, completed_sources: usize, pending_sources: usize) -> HubError {
        HubError::RunTimeout {
            seconds: self.options.run_timeout.as_secs(),
            completed_sources,
            pending_sources,
        }
    }

    /// Replace the published tree with this run's artifact, then persist the
    /// dedup state. Nothing is written if the artifact cannot be published.
    pub fn publish(&self, report: &RunReport, out_dir: &Path) -> Result<()> {
        report.artifact.publish(out_dir)?;

        if let Some(path) = &self.options.state_path {
            let mut seen = report.seen.clone();
            seen.record(report.emitted_ids.iter().cloned(), self.config.dedup.max_seen_ids);
            seen.mark_success(report.started_at);
            seen.save(path)?;
        }
        Ok(())
    }
}
