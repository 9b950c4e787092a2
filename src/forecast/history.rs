//! Small persistent append-only store for PVC utilization history, used by
//! the capacity forecaster to project trends across invocations. The file
//! always parses as a valid document: writes go to a temp file first and
//! are renamed into place.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Series are trimmed to the most recent samples per (namespace, PVC) key.
pub const MAX_SAMPLES_PER_KEY: usize = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    pub ts: DateTime<Utc>,
    pub util: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryDoc {
    #[serde(default)]
    pub pvc: BTreeMap<String, Vec<Sample>>,
}

/// History store backed by `<user-cache>/kubectl-smart/metrics.json`.
#[derive(Debug, Clone)]
pub struct SampleHistory {
    path: PathBuf,
}

impl SampleHistory {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::cache_dir().map(|d| d.join("kubectl-smart").join("metrics.json"))
    }

    pub fn at_default_location() -> Option<Self> {
        Self::default_path().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document; a missing or unreadable file is an empty history.
    pub fn load(&self) -> HistoryDoc {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Metrics history unreadable, starting fresh: {}", e);
                HistoryDoc::default()
            }),
            Err(_) => HistoryDoc::default(),
        }
    }

    /// Append one sample under `<namespace>/<pvc>`, trim the series to the
    /// most recent cap, and persist atomically. Returns the updated series.
    pub fn append(&self, key: &str, sample: Sample) -> Vec<Sample> {
        let mut doc = self.load();
        let series = doc.pvc.entry(key.to_string()).or_default();
        series.push(sample);
        if series.len() > MAX_SAMPLES_PER_KEY {
            series.drain(..series.len() - MAX_SAMPLES_PER_KEY);
        }
        let result = series.clone();
        if let Err(e) = self.save(&doc) {
            warn!("Failed to persist metrics history: {}", e);
        }
        result
    }

    pub fn series(&self, key: &str) -> Vec<Sample> {
        self.load().pvc.get(key).cloned().unwrap_or_default()
    }

    fn save(&self, doc: &HistoryDoc) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(doc)?)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("Persisted metrics history to {}", self.path.display());
        Ok(())
    }
}
