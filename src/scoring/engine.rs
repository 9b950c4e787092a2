//! Heuristic scoring: converts records and events into scored issues,
//! selects the root cause, and extracts contributing factors. The score
//! function is pure; "now" is an explicit parameter so re-running on
//! identical inputs produces identical output.

use chrono::{DateTime, Utc};
use log::debug;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::graph::{DependencyGraph, Direction};
use crate::models::{Issue, IssueSeverity, ResourceKind, ResourceRecord};

use super::weights::Weights;

/// Statuses that mark an upstream neighbor as failing for the
/// critical-path heuristic.
const FAILING_STATUSES: [&str; 3] = ["Failed", "NotReady", "Unavailable"];

/// Minimum unhealthy base score that turns a status into an issue.
const STATUS_ISSUE_THRESHOLD: f64 = 30.0;

/// Base score attached to log-derived issues.
const LOG_ISSUE_SCORE: f64 = 85.0;

pub struct ScoringEngine {
    weights: Weights,
}

impl ScoringEngine {
    pub fn new(weights: Weights) -> Self {
        Self { weights }
    }

    pub fn with_defaults() -> Self {
        Self::new(Weights::default())
    }

    /// Pure scoring function: base score by reason, keyword bonuses
    /// (each group counted once), critical-path multiplier, age bucket
    /// multiplier, clamped to [0, 100].
    pub fn score_issue(
        &self,
        reason: &str,
        message: &str,
        critical_path: bool,
        timestamp: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> f64 {
        let mut score = self.weights.base_score(reason);

        let message_lower = message.to_lowercase();
        for group in self.weights.keywords.values() {
            if group.patterns.iter().any(|p| message_lower.contains(p)) {
                score += group.score;
            }
        }

        if critical_path {
            score *= self.weights.multipliers.critical_path;
        }

        if let Some(ts) = timestamp {
            let age_hours = (now - ts).num_seconds() as f64 / 3600.0;
            score *= self.weights.age_multiplier(age_hours.max(0.0));
        }

        score.clamp(0.0, 100.0)
    }

    /// Build an issue from an event record targeting `target`. The pure
    /// score is additionally multiplied by resource-type and event-type
    /// factors before the final clamp.
    pub fn issue_from_event(
        &self,
        event: &ResourceRecord,
        target: &ResourceRecord,
        critical_path: bool,
        now: DateTime<Utc>,
    ) -> Issue {
        let reason = event.property_str("reason").unwrap_or("Unknown").to_string();
        let message = event.property_str("message").unwrap_or("").to_string();
        let event_type = event.property_str("type").unwrap_or("Normal");

        let mut score =
            self.score_issue(&reason, &message, critical_path, event.creation_timestamp, now);
        score *= self.weights.resource_type_multiplier(target.kind.as_str());
        score *= self.weights.event_type_multiplier(event_type);
        let score = score.clamp(0.0, 100.0);

        Issue {
            resource_uid: target.uid.clone(),
            title: format!("{}: {}", reason, target.name),
            description: message.clone(),
            reason,
            message,
            severity: IssueSeverity::from_score(score),
            score,
            critical_path,
            timestamp: event.creation_timestamp,
            suggested_actions: Vec::new(),
            metadata: Default::default(),
        }
    }

    /// Synthesize an issue for a resource in an unhealthy state, when the
    /// status base score crosses the threshold.
    pub fn issue_from_status(
        &self,
        resource: &ResourceRecord,
        critical_path: bool,
    ) -> Option<Issue> {
        let status = resource.status.as_deref()?;
        let score = self.weights.status_score(status);
        if score < STATUS_ISSUE_THRESHOLD {
            return None;
        }
        let score = score.clamp(0.0, 100.0);
        Some(Issue {
            resource_uid: resource.uid.clone(),
            title: format!("Resource Status: {}", status),
            description: format!(
                "{} {} is in {} state",
                resource.kind, resource.name, status
            ),
            reason: format!("Status{}", status),
            message: format!("Resource is in unhealthy state: {}", status),
            severity: IssueSeverity::from_score(score),
            score,
            critical_path,
            timestamp: resource.creation_timestamp,
            suggested_actions: Vec::new(),
            metadata: Default::default(),
        })
    }

    /// Build an issue from a log-analysis record, attached to the subject.
    pub fn issue_from_logs(
        &self,
        log_record: &ResourceRecord,
        target: &ResourceRecord,
        now: DateTime<Utc>,
    ) -> Option<Issue> {
        let errors: Vec<&str> = log_record
            .property("errors")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|e| e.as_str()).collect())
            .unwrap_or_default();
        if errors.is_empty() {
            return None;
        }
        let last = errors.last().unwrap();
        let last_short = if last.len() > 80 {
            format!("{}...", &last[..77])
        } else {
            last.to_string()
        };
        Some(Issue {
            resource_uid: target.uid.clone(),
            title: format!("Log Errors: Found {} error(s)", errors.len()),
            description: format!(
                "Log analysis detected {} unique error patterns. Recent: {}",
                errors.len(),
                last_short
            ),
            reason: "LogFailure".to_string(),
            message: errors
                .iter()
                .map(|e| format!("- {}", e))
                .collect::<Vec<_>>()
                .join("\n"),
            severity: IssueSeverity::from_score(LOG_ISSUE_SCORE),
            score: LOG_ISSUE_SCORE,
            critical_path: true,
            timestamp: Some(now),
            suggested_actions: vec![
                "Review full logs for context".to_string(),
                "Check application configuration".to_string(),
            ],
            metadata: Default::default(),
        })
    }

    /// Analyze all records and events into a deterministically ordered
    /// issue list. Orphan events (no resolvable target) are dropped.
    pub fn analyze(
        &self,
        resources: &[ResourceRecord],
        events: &[ResourceRecord],
        graph: &DependencyGraph,
        now: DateTime<Utc>,
    ) -> Vec<Issue> {
        let mut issues = Vec::new();
        let resource_map: HashMap<&str, &ResourceRecord> =
            resources.iter().map(|r| (r.uid.as_str(), r)).collect();

        // Log issues attach to the primary subject: the first Pod seen.
        let target_pod = resources.iter().find(|r| r.kind == ResourceKind::Pod);
        if let Some(pod) = target_pod {
            for record in resources {
                if record.kind == ResourceKind::LogAnalysis {
                    if let Some(issue) = self.issue_from_logs(record, pod, now) {
                        issues.push(issue);
                    }
                }
            }
        }

        for event in events {
            if event.kind != ResourceKind::Event {
                continue;
            }
            let Some(target) = self.resolve_event_target(event, resources, &resource_map) else {
                debug!("Dropping orphan event {}", event.name);
                continue;
            };

            let critical_path = graph
                .dependencies(&target.uid, Direction::Upstream)
                .iter()
                .filter_map(|uid| resource_map.get(uid.as_str()))
                .any(|dep| {
                    dep.status
                        .as_deref()
                        .map(|s| FAILING_STATUSES.contains(&s))
                        .unwrap_or(false)
                });

            issues.push(self.issue_from_event(event, target, critical_path, now));
        }

        for resource in resources {
            if matches!(resource.kind, ResourceKind::Event | ResourceKind::LogAnalysis) {
                continue;
            }
            // A resource with many dependents is on the critical path.
            let critical_path =
                graph.dependencies(&resource.uid, Direction::Downstream).len() > 2;
            if let Some(issue) = self.issue_from_status(resource, critical_path) {
                issues.push(issue);
            }
        }

        issues.sort_by(Self::issue_order);
        issues
    }

    /// Severity rank descending, score descending, then (uid, reason)
    /// lexicographically so output is byte-stable.
    fn issue_order(a: &Issue, b: &Issue) -> Ordering {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
            .then_with(|| a.resource_uid.cmp(&b.resource_uid))
            .then_with(|| a.reason.cmp(&b.reason))
    }

    fn resolve_event_target<'a>(
        &self,
        event: &ResourceRecord,
        resources: &'a [ResourceRecord],
        resource_map: &HashMap<&str, &'a ResourceRecord>,
    ) -> Option<&'a ResourceRecord> {
        let involved = event.property("involvedObject")?;
        if let Some(uid) = involved.get("uid").and_then(|v| v.as_str()) {
            if let Some(&target) = resource_map.get(uid) {
                return Some(target);
            }
        }
        let name = involved.get("name").and_then(|v| v.as_str())?;
        let kind = involved.get("kind").and_then(|v| v.as_str())?;
        let namespace = involved
            .get("namespace")
            .and_then(|v| v.as_str())
            .or(event.namespace.as_deref());
        resources.iter().find(|r| {
            r.name == name && r.kind.as_str() == kind && r.namespace.as_deref() == namespace
        })
    }

    /// Root cause preference: critical issues on the critical path, then the
    /// top-scoring critical, then the top-scoring issue overall.
    pub fn root_cause<'a>(&self, issues: &'a [Issue]) -> Option<&'a Issue> {
        if issues.is_empty() {
            return None;
        }
        let critical: Vec<&Issue> = issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Critical)
            .collect();
        if !critical.is_empty() {
            if let Some(on_path) = critical.iter().copied().find(|i| i.critical_path) {
                return Some(on_path);
            }
            return Some(critical[0]);
        }
        issues.first()
    }

    /// Top two remaining issues with score ≥ 50, excluding equivalents of
    /// the root cause.
    pub fn contributing_factors<'a>(
        &self,
        issues: &'a [Issue],
        root_cause: Option<&Issue>,
    ) -> Vec<&'a Issue> {
        issues
            .iter()
            .filter(|i| {
                root_cause
                    .map(|rc| i.resource_uid != rc.resource_uid || i.reason != rc.reason)
                    .unwrap_or(true)
            })
            .filter(|i| i.score >= 50.0)
            .take(2)
            .collect()
    }
}
