//! The tunable weights table steering the scoring heuristic. Loaded from
//! `weights.toml` when present, with embedded defaults otherwise. The file
//! path is confined to a base directory; anything outside is rejected.

use log::{debug, warn};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordGroup {
    pub patterns: Vec<String>,
    pub score: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Multipliers {
    #[serde(default)]
    pub resource_type: BTreeMap<String, f64>,
    #[serde(default)]
    pub event_type: BTreeMap<String, f64>,
    #[serde(default = "default_critical_path")]
    pub critical_path: f64,
    #[serde(default)]
    pub age_hours: BTreeMap<String, f64>,
}

fn default_critical_path() -> f64 {
    1.5
}

impl Default for Multipliers {
    fn default() -> Self {
        Self {
            resource_type: BTreeMap::new(),
            event_type: BTreeMap::new(),
            critical_path: default_critical_path(),
            age_hours: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Weights {
    #[serde(default)]
    pub base_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub multipliers: Multipliers,
    #[serde(default)]
    pub keywords: BTreeMap<String, KeywordGroup>,
}

impl Default for Weights {
    fn default() -> Self {
        let base_scores: BTreeMap<String, f64> = [
            // Event reasons
            ("Failed", 50.0),
            ("FailedMount", 80.0),
            ("FailedScheduling", 85.0),
            ("ImagePullBackOff", 75.0),
            ("ErrImagePull", 75.0),
            ("Unhealthy", 70.0),
            ("NetworkNotReady", 60.0),
            ("BackOff", 30.0),
            ("Pulling", 10.0),
            ("Created", 5.0),
            ("Started", 5.0),
            ("Killing", 40.0),
            ("Preempting", 45.0),
            // Resource statuses
            ("status_Failed", 90.0),
            ("status_Pending", 40.0),
            ("status_Unknown", 70.0),
            ("status_NotReady", 80.0),
            ("status_Unavailable", 75.0),
            ("status_Running", 0.0),
            ("status_Active", 0.0),
            ("status_Ready", 0.0),
            ("status_Available", 0.0),
            ("status_Bound", 0.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let resource_type: BTreeMap<String, f64> = [
            ("Node", 2.0),
            ("PersistentVolume", 1.8),
            ("PersistentVolumeClaim", 1.6),
            ("Pod", 1.2),
            ("Deployment", 1.4),
            ("StatefulSet", 1.5),
            ("DaemonSet", 1.4),
            ("Service", 1.3),
            ("ConfigMap", 1.1),
            ("Secret", 1.2),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let event_type: BTreeMap<String, f64> = [("Warning", 2.0), ("Normal", 1.0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        let age_hours: BTreeMap<String, f64> = [
            ("0-1", 1.0),
            ("1-6", 0.9),
            ("6-24", 0.7),
            ("24-168", 0.5),
            ("168+", 0.3),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let keywords: BTreeMap<String, KeywordGroup> = [
            (
                "critical",
                KeywordGroup {
                    patterns: [
                        "failed",
                        "error",
                        "timeout",
                        "unable",
                        "cannot",
                        "denied",
                        "not found",
                        "no space",
                        "disk full",
                        "out of memory",
                        "connection refused",
                        "network unreachable",
                        "permission denied",
                    ]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                    score: 15.0,
                },
            ),
            (
                "warning",
                KeywordGroup {
                    patterns: [
                        "warning",
                        "deprecated",
                        "retry",
                        "backoff",
                        "slow",
                        "degraded",
                        "limited",
                        "throttled",
                    ]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                    score: 8.0,
                },
            ),
            (
                "resource_specific",
                KeywordGroup {
                    patterns: [
                        "insufficient",
                        "exceeded",
                        "quota",
                        "limit",
                        "capacity",
                        "evicted",
                        "preempted",
                        "oomkilled",
                    ]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                    score: 12.0,
                },
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            base_scores,
            multipliers: Multipliers {
                resource_type,
                event_type,
                critical_path: 1.5,
                age_hours,
            },
            keywords,
        }
    }
}

impl Weights {
    /// Load a weights file confined to `base_dir`. Any failure (outside the
    /// base directory, missing, unreadable, malformed) logs once and falls
    /// back to the embedded defaults.
    pub fn load(weights_file: &Path, base_dir: &Path) -> Self {
        let base = match base_dir.canonicalize() {
            Ok(b) => b,
            Err(_) => {
                warn!("Weights base directory unavailable, using defaults");
                return Self::default();
            }
        };
        let resolved = if weights_file.is_absolute() {
            weights_file.to_path_buf()
        } else {
            base.join(weights_file)
        };
        let resolved = match resolved.canonicalize() {
            Ok(p) => p,
            Err(_) => {
                warn!("Weights file not found, using defaults: {}", resolved.display());
                return Self::default();
            }
        };
        if !resolved.starts_with(&base) {
            warn!(
                "Weights file rejected: {} is outside {}",
                resolved.display(),
                base.display()
            );
            return Self::default();
        }
        match std::fs::read_to_string(&resolved)
            .map_err(|e| e.to_string())
            .and_then(|text| toml::from_str::<Weights>(&text).map_err(|e| e.to_string()))
        {
            Ok(weights) => {
                debug!("Loaded weights from {}", resolved.display());
                weights
            }
            Err(e) => {
                warn!("Failed to load weights file, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Load `weights.toml` from the directory containing the executable.
    pub fn load_default() -> Self {
        let base_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|d| d.to_path_buf()));
        match base_dir {
            Some(dir) => Self::load(Path::new("weights.toml"), &dir),
            None => Self::default(),
        }
    }

    pub fn base_score(&self, reason: &str) -> f64 {
        self.base_scores.get(reason).copied().unwrap_or(20.0)
    }

    pub fn status_score(&self, status: &str) -> f64 {
        self.base_scores
            .get(&format!("status_{}", status))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn resource_type_multiplier(&self, kind: &str) -> f64 {
        self.multipliers
            .resource_type
            .get(kind)
            .copied()
            .unwrap_or(1.0)
    }

    pub fn event_type_multiplier(&self, event_type: &str) -> f64 {
        self.multipliers
            .event_type
            .get(event_type)
            .copied()
            .unwrap_or(1.0)
    }

    /// Age bucket multiplier: recent issues weigh more than stale ones.
    pub fn age_multiplier(&self, age_hours: f64) -> f64 {
        let (key, fallback) = if age_hours < 1.0 {
            ("0-1", 1.0)
        } else if age_hours < 6.0 {
            ("1-6", 0.9)
        } else if age_hours < 24.0 {
            ("6-24", 0.7)
        } else if age_hours < 168.0 {
            ("24-168", 0.5)
        } else {
            ("168+", 0.3)
        };
        self.multipliers
            .age_hours
            .get(key)
            .copied()
            .unwrap_or(fallback)
    }
}
