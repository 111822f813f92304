pub mod types;
pub mod config;
pub mod utils;
pub mod traits;
pub mod fetcher;
pub mod parser;
pub mod sources;
pub mod normalizer;
pub mod dedup;
pub mod state;
pub mod router;
pub mod policy;
pub mod render;
pub mod pipeline;

pub use types::*;
pub use config::{ConfigError, HubConfig, MatchRule, PublicPolicy, TopicPack};
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use traits::SourceAdapter;
pub use sources::{EdinetSource, RssFeedSource};
pub use normalizer::Normalizer;
pub use dedup::{dedupe, Deduplicator};
pub use state::SeenStore;
pub use router::route;
pub use policy::{apply_policy, FilteredSiteData};
pub use render::{render, SiteArtifact};
pub use pipeline::{Pipeline, RunOptions, RunReport};
