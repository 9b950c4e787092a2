//! Command orchestrators for diag, graph, and top. Each composes the
//! collectors, parser registry, graph builder, and scoring/forecasting into
//! a typed result plus an exit code. Collection fans out concurrently under
//! an outer command deadline; everything after it runs sequentially.

use chrono::Utc;
use log::{debug, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinSet;

use crate::collectors::{Collector, KubectlRunner, ResilienceStack};
use crate::forecast::ForecastingEngine;
use crate::graph::{DependencyGraph, Direction, DEFAULT_MAX_DEPTH};
use crate::models::{
    AnalysisConfig, DiagnosisResult, GraphAnalysis, Issue, IssueSeverity, RawBlob, ResourceKind,
    ResourceRecord, SubjectContext, TopAnalysis,
};
use crate::parsers;
use crate::scoring::{ScoringEngine, Weights};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Resource {0} not found")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

/// A typed command result paired with the process exit code.
pub struct CommandOutcome<T> {
    pub result: T,
    pub exit_code: i32,
}

/// Owns the per-process state shared across commands: configuration, the
/// resilience stack, the weights table, and a graph reused by `graph` when
/// an earlier command in the same process already built one.
pub struct Pipeline {
    config: AnalysisConfig,
    resilience: Arc<ResilienceStack>,
    scoring: ScoringEngine,
    graph: DependencyGraph,
}

impl Pipeline {
    pub fn new(config: AnalysisConfig) -> Self {
        let weights = match &config.weights_file {
            Some(path) => {
                let base = path
                    .parent()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| std::path::PathBuf::from("."));
                Weights::load(path, &base)
            }
            None => Weights::load_default(),
        };
        Self {
            resilience: Arc::new(ResilienceStack::new()),
            scoring: ScoringEngine::new(weights),
            graph: DependencyGraph::new(),
            config,
        }
    }

    /// Dispatch the named collectors in parallel and wait for all of them,
    /// bounded by the command deadline. When the deadline fires, in-flight
    /// collectors are cancelled and the partial blob set proceeds.
    async fn collect_blobs(
        &self,
        subject: &SubjectContext,
        collectors: Vec<Collector>,
    ) -> Vec<RawBlob> {
        let runner = Arc::new(KubectlRunner::new(
            self.config.collector_timeout,
            self.resilience.clone(),
        ));

        let mut set = JoinSet::new();
        for collector in collectors {
            let runner = runner.clone();
            let subject = subject.clone();
            set.spawn(async move { collector.collect(&runner, &subject).await });
        }

        let deadline =
            tokio::time::Instant::now() + Duration::from_secs_f64(self.config.command_timeout);
        let mut blobs = Vec::new();
        loop {
            match tokio::time::timeout_at(deadline, set.join_next()).await {
                Ok(Some(Ok(blob))) => blobs.push(blob),
                Ok(Some(Err(e))) => warn!("Collector task failed: {}", e),
                Ok(None) => break,
                Err(_) => {
                    warn!("Command deadline reached, cancelling in-flight collectors");
                    set.abort_all();
                    break;
                }
            }
        }
        debug!("Collected {} blobs for {}", blobs.len(), subject.full_name());
        blobs
    }

    fn named_collectors(command: &str, kind: ResourceKind) -> Vec<Collector> {
        Collector::names_for_command(command)
            .into_iter()
            .filter_map(|name| Collector::create(name, kind))
            .collect()
    }

    /// Diagnose a single resource: collect, parse, build the graph, score,
    /// and select a root cause with contributing factors.
    pub async fn diag(
        &mut self,
        subject: SubjectContext,
    ) -> Result<CommandOutcome<DiagnosisResult>, PipelineError> {
        let started = Instant::now();
        let now = Utc::now();

        let collectors = Self::named_collectors("diag", subject.kind);
        let blobs = self.collect_blobs(&subject, collectors).await;
        let records = parsers::parse_all(&blobs);

        self.graph = DependencyGraph::new();
        self.graph.add_resources(&records);

        let target = records
            .iter()
            .find(|r| {
                r.kind == subject.kind
                    && r.name == subject.name
                    && r.namespace == subject.namespace
            })
            .cloned();

        let Some(target) = target else {
            return Ok(CommandOutcome {
                result: DiagnosisResult {
                    subject,
                    resource: None,
                    issues: Vec::new(),
                    root_cause: None,
                    contributing_factors: Vec::new(),
                    suggested_actions: Vec::new(),
                    analysis_duration: started.elapsed().as_secs_f64(),
                    timestamp: now,
                },
                exit_code: 2,
            });
        };

        let events: Vec<ResourceRecord> = records
            .iter()
            .filter(|r| r.kind == ResourceKind::Event)
            .cloned()
            .collect();

        let all_issues = self.scoring.analyze(&records, &events, &self.graph, now);
        let issues: Vec<Issue> = all_issues
            .into_iter()
            .filter(|i| i.resource_uid == target.uid)
            .collect();

        let root_cause = self.scoring.root_cause(&issues).cloned();
        let contributing_factors: Vec<Issue> = self
            .scoring
            .contributing_factors(&issues, root_cause.as_ref())
            .into_iter()
            .cloned()
            .collect();
        let suggested_actions = suggested_actions(
            &target,
            root_cause.as_ref(),
            self.config.max_suggested_actions,
        );

        let exit_code = if issues.iter().any(|i| i.severity >= IssueSeverity::Warning) {
            2
        } else {
            0
        };

        Ok(CommandOutcome {
            result: DiagnosisResult {
                subject,
                resource: Some(target),
                issues,
                root_cause,
                contributing_factors,
                suggested_actions,
                analysis_duration: started.elapsed().as_secs_f64(),
                timestamp: now,
            },
            exit_code,
        })
    }

    /// Render the dependency tree around a resource. Reuses a graph built
    /// earlier in this process, else collects the minimal data set.
    pub async fn graph(
        &mut self,
        subject: SubjectContext,
        direction: Direction,
    ) -> Result<CommandOutcome<GraphAnalysis>, PipelineError> {
        let started = Instant::now();

        if self.graph.is_empty() {
            let collectors = Self::named_collectors("graph", subject.kind);
            let blobs = self.collect_blobs(&subject, collectors).await;
            let records = parsers::parse_all(&blobs);
            self.graph.add_resources(&records);
        }

        let target_uid = self
            .graph
            .find(subject.kind, &subject.name, subject.namespace.as_deref())
            .map(|r| r.uid.clone())
            .ok_or_else(|| PipelineError::NotFound(subject.full_name()))?;

        let max_depth = if subject.depth > 0 {
            subject.depth
        } else {
            DEFAULT_MAX_DEPTH
        };
        let ascii_graph = self.graph.to_ascii(&target_uid, direction, max_depth);
        let upstream = self.graph.dependencies(&target_uid, Direction::Upstream);
        let downstream = self.graph.dependencies(&target_uid, Direction::Downstream);

        Ok(CommandOutcome {
            result: GraphAnalysis {
                subject,
                ascii_graph,
                direction: match direction {
                    Direction::Upstream => "upstream".to_string(),
                    Direction::Downstream => "downstream".to_string(),
                },
                upstream,
                downstream,
                vertex_count: self.graph.vertex_count(),
                edge_count: self.graph.edge_count(),
                analysis_duration: started.elapsed().as_secs_f64(),
                timestamp: Utc::now(),
            },
            exit_code: 0,
        })
    }

    /// Forecast capacity and certificate problems for a namespace.
    /// Advisory: always exits 0.
    pub async fn top(
        &mut self,
        subject: SubjectContext,
        horizon_hours: u32,
    ) -> Result<CommandOutcome<TopAnalysis>, PipelineError> {
        let started = Instant::now();
        let now = Utc::now();

        let mut collectors = Self::named_collectors("top", subject.kind);
        // Targeted listings feeding the forecasters.
        for resource_type in [
            "secrets",
            "ingresses",
            "persistentvolumeclaims",
            "persistentvolumes",
        ] {
            collectors.push(Collector::Get {
                resource_type: resource_type.to_string(),
            });
        }

        let blobs = self.collect_blobs(&subject, collectors).await;
        let records = parsers::parse_all(&blobs);

        // Namespace-scoped records plus cluster-scoped nodes and volumes.
        let scoped: Vec<ResourceRecord> = records
            .iter()
            .filter(|r| {
                r.namespace.as_deref() == Some(subject.name.as_str())
                    || matches!(
                        r.kind,
                        ResourceKind::Node | ResourceKind::PersistentVolume
                    )
            })
            .cloned()
            .collect();

        let metrics_records: Vec<ResourceRecord> =
            records.iter().filter(|r| r.has_metrics()).cloned().collect();

        let forecaster = ForecastingEngine::with_defaults(horizon_hours);
        let capacity_warnings = forecaster.predict_capacity(&scoped, &metrics_records, now);
        let certificate_warnings = forecaster.predict_certificate_expiry(&scoped, now);

        Ok(CommandOutcome {
            result: TopAnalysis {
                subject,
                capacity_warnings,
                certificate_warnings,
                forecast_horizon_hours: horizon_hours,
                analysis_duration: started.elapsed().as_secs_f64(),
                timestamp: now,
            },
            exit_code: 0,
        })
    }
}

/// Fixed decision table mapping the diagnosis onto concrete next steps,
/// capped at the configured maximum.
pub fn suggested_actions(
    resource: &ResourceRecord,
    root_cause: Option<&Issue>,
    max_actions: usize,
) -> Vec<String> {
    let mut actions = Vec::new();
    let ns_flag = resource
        .namespace
        .as_deref()
        .map(|ns| format!(" -n {}", ns))
        .unwrap_or_default();

    if matches!(
        resource.status.as_deref(),
        Some("Failed") | Some("Pending") | Some("Unknown")
    ) {
        actions.push(format!("Check logs: kubectl logs {}{}", resource.name, ns_flag));
    }

    if let Some(rc) = root_cause {
        let reason = rc.reason.as_str();
        let message = rc.message.to_lowercase();
        if reason.contains("FailedMount") || message.contains("mount") {
            actions.push("Check PVC status: kubectl get pvc".to_string());
            actions.push("Verify storage class: kubectl get storageclass".to_string());
        } else if reason.contains("FailedScheduling") {
            actions.push("Check node resources: kubectl top nodes".to_string());
            actions.push("Check pod resource requests vs available capacity".to_string());
            actions.push("Review node taints and pod tolerations".to_string());
        } else if reason.contains("ImagePullBackOff") || reason.contains("ErrImagePull") {
            actions.push("Verify image name and tag".to_string());
            actions.push("Check image pull secrets if using private registry".to_string());
        } else if reason.contains("CrashLoopBackOff") || message.contains("crash") {
            actions.push(format!(
                "Inspect previous container logs: kubectl logs {}{} --previous",
                resource.name, ns_flag
            ));
        } else if reason.contains("Unhealthy") || message.contains("probe") {
            actions.push("Inspect liveness/readiness probe timing and thresholds".to_string());
        } else if message.contains("dns") {
            actions.push("Check CoreDNS health in kube-system".to_string());
        } else if message.contains("forbidden") || message.contains("rbac") {
            actions.push("Check permissions: kubectl auth can-i <verb> <resource>".to_string());
        } else if message.contains("network policy") || message.contains("networkpolicy") {
            actions.push("Review NetworkPolicy rules in the namespace".to_string());
        }
    }

    if resource.kind == ResourceKind::Pod {
        actions.push(format!(
            "Get detailed info: kubectl describe pod {}{}",
            resource.name, ns_flag
        ));
    }

    actions.truncate(max_actions);
    actions
}
