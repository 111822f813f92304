use crate::types::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    seen_ids: Vec<String>,
    #[serde(default)]
    last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    last_success: Option<DateTime<Utc>>,
}

/// Ids emitted by previous runs. Read once at the start of a run and
/// written once after a successful publish. A missing or unreadable file
/// is an empty store, never an error.
#[derive(Debug, Clone, Default)]
pub struct SeenStore {
    ids: Vec<String>,
    index: HashSet<String>,
    last_run: Option<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
}

impl SeenStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No dedup state at {}, starting empty", path.display());
                return Self::empty();
            }
            Err(e) => {
                warn!("Could not read dedup state {}: {}; starting empty", path.display(), e);
                return Self::empty();
            }
        };

        match serde_json::from_str::<StateFile>(&raw) {
            Ok(file) => {
                let mut store = Self {
                    last_run: file.last_run,
                    last_success: file.last_success,
                    ..Self::default()
                };
                store.extend(file.seen_ids);
                info!("Loaded {} previously seen ids from {}", store.len(), path.display());
                store
            }
            Err(e) => {
                warn!("Ignoring corrupt dedup state {}: {}", path.display(), e);
                Self::empty()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.ids.iter()
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.last_run
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success
    }

    /// Merge ids from this run, keeping at most `max_ids` of the newest.
    pub fn record<I>(&mut self, ids: I, max_ids: usize)
    where
        I: IntoIterator<Item = String>,
    {
        self.extend(ids);
        if self.ids.len() > max_ids {
            let excess = self.ids.len() - max_ids;
            for old in self.ids.drain(..excess) {
                self.index.remove(&old);
            }
        }
    }

    pub fn mark_success(&mut self, at: DateTime<Utc>) {
        self.last_run = Some(at);
        self.last_success = Some(at);
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = StateFile {
            seen_ids: self.ids.clone(),
            last_run: self.last_run,
            last_success: self.last_success,
        };
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&file)?)?;
        fs::rename(&tmp, path)?;
        debug!("Saved {} seen ids to {}", self.ids.len(), path.display());
        Ok(())
    }

    fn extend<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        for id in ids {
            if self.index.insert(id.clone()) {
                self.ids.push(id);
            }
        }
    }
}
