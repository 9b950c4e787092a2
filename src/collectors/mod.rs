//! Collectors gather raw data from the kubectl CLI in a time-bounded,
//! retrying manner and hand it to the parsers as opaque blobs. Every failure
//! is soft: the collector logs and returns an empty blob with the correct
//! source and content type so downstream stages continue on partial data.

use futures::future::join_all;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use crate::models::{
    BlobData, RawBlob, ResourceKind, Scope, SubjectContext, CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT,
};
use crate::resilience::{with_resilience, CircuitBreaker, RateLimiter, RetryStrategy};

pub const DEFAULT_LOG_TAIL_LINES: u32 = 100;

/// Resource types always fetched as a listing, to feed forecasting.
const LIST_ONLY_TYPES: [&str; 4] = [
    "secrets",
    "ingresses",
    "persistentvolumeclaims",
    "persistentvolumes",
];

const RBAC_PATTERNS: [&str; 5] = [
    "forbidden",
    "unauthorized",
    "access denied",
    "rbac",
    "permission denied",
];

const TRANSIENT_PATTERNS: [&str; 4] = [
    "timeout",
    "temporarily unavailable",
    "i/o timeout",
    "connection refused",
];

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("kubectl command timed out after {0}s (retries exhausted)")]
    Timeout(f64),
    #[error("RBAC permission denied: {0}")]
    Rbac(String),
    #[error("kubectl command failed: {0}")]
    Kubectl(String),
    #[error("Failed to parse kubectl JSON output: {0}")]
    Decode(String),
    #[error("kubectl not found in PATH")]
    Missing,
}

impl CollectorError {
    /// Transient faults are retried with backoff; everything else is terminal.
    pub fn is_transient(&self) -> bool {
        match self {
            CollectorError::Timeout(_) => true,
            CollectorError::Kubectl(msg) => {
                let lower = msg.to_lowercase();
                TRANSIENT_PATTERNS.iter().any(|p| lower.contains(p))
            }
            _ => false,
        }
    }
}

fn find_kubectl() -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join("kubectl");
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Shared resilience state: one breaker per collector name, a global
/// rate limiter, and the retry schedule for transient faults.
pub struct ResilienceStack {
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
    pub limiter: RateLimiter,
    pub retry: RetryStrategy,
}

impl ResilienceStack {
    pub fn new() -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            limiter: RateLimiter::default(),
            retry: RetryStrategy {
                max_retries: 2,
                ..RetryStrategy::default()
            },
        }
    }

    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap();
        breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::named(name)))
            .clone()
    }
}

impl Default for ResilienceStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs kubectl with a per-call deadline, stderr classification, and the
/// resilience stack. The binary path is located once and cached.
pub struct KubectlRunner {
    kubectl_path: OnceLock<Option<PathBuf>>,
    timeout_seconds: f64,
    resilience: Arc<ResilienceStack>,
}

impl KubectlRunner {
    pub fn new(timeout_seconds: f64, resilience: Arc<ResilienceStack>) -> Self {
        Self {
            kubectl_path: OnceLock::new(),
            timeout_seconds,
            resilience,
        }
    }

    fn kubectl_path(&self) -> Result<&PathBuf, CollectorError> {
        self.kubectl_path
            .get_or_init(find_kubectl)
            .as_ref()
            .ok_or(CollectorError::Missing)
    }

    /// Run one kubectl command through breaker, limiter, and transient retry.
    /// `args` are fixed per collector; subject context contributes only the
    /// whitelisted `--context`/`--namespace` flags. User strings are argv
    /// elements, never shell text.
    pub async fn run(
        &self,
        collector_name: &str,
        args: &[&str],
        subject: &SubjectContext,
        json_output: bool,
    ) -> Result<BlobData, CollectorError> {
        let kubectl = self.kubectl_path()?.clone();
        let mut argv: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        argv.extend(subject.kubectl_args());
        if json_output {
            argv.push("-o".to_string());
            argv.push("json".to_string());
        }
        debug!("Running kubectl {:?} (timeout {}s)", argv, self.timeout_seconds);

        let breaker = self.resilience.breaker(collector_name);
        let kubectl_ref = &kubectl;
        let argv_ref = &argv;
        let outcome = with_resilience(
            &breaker,
            &self.resilience.limiter,
            &self.resilience.retry,
            move || async move {
                match self.invoke_once(kubectl_ref, argv_ref, json_output).await {
                    Ok(data) => Ok(Ok(data)),
                    // Transient faults bubble as Err so the retry layer backs off;
                    // terminal failures pass through untouched.
                    Err(e) if e.is_transient() => Err(e),
                    Err(e) => Ok(Err(e)),
                }
            },
        )
        .await;

        match outcome {
            Ok(inner) => inner,
            Err(e) => match e.downcast::<CollectorError>() {
                Ok(ce) => Err(ce),
                Err(other) => Err(CollectorError::Kubectl(other.to_string())),
            },
        }
    }

    async fn invoke_once(
        &self,
        kubectl: &std::path::Path,
        argv: &[String],
        json_output: bool,
    ) -> Result<BlobData, CollectorError> {
        let child = Command::new(kubectl)
            .args(argv)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CollectorError::Kubectl(e.to_string()))?;

        let deadline = Duration::from_secs_f64(self.timeout_seconds);
        let output = match tokio::time::timeout(deadline, child.wait_with_output()).await {
            Ok(Ok(out)) => out,
            Ok(Err(e)) => return Err(CollectorError::Kubectl(e.to_string())),
            // kill_on_drop releases the subprocess handle on cancellation.
            Err(_) => return Err(CollectorError::Timeout(self.timeout_seconds)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let lower = stderr.to_lowercase();
            if RBAC_PATTERNS.iter().any(|p| lower.contains(p)) {
                return Err(CollectorError::Rbac(stderr.trim().to_string()));
            }
            return Err(CollectorError::Kubectl(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if json_output && !stdout.trim().is_empty() {
            let value: serde_json::Value =
                serde_json::from_str(&stdout).map_err(|e| CollectorError::Decode(e.to_string()))?;
            Ok(BlobData::Json(value))
        } else {
            Ok(BlobData::Text(stdout))
        }
    }
}

/// The closed set of built-in collectors. Dispatch is by registered name.
#[derive(Debug, Clone)]
pub enum Collector {
    /// List or fetch a resource set as JSON.
    Get { resource_type: String },
    /// Human-readable object description.
    Describe { resource_type: String },
    /// Events sorted by last timestamp, field-filtered for resource scope.
    Events,
    /// Tailed pod logs.
    Logs { tail_lines: u32 },
    /// `kubectl top` tabular output; optional.
    Metrics,
    /// Per-node kubelet Prometheus scrape via the raw proxy endpoint.
    Kubelet,
}

impl Collector {
    /// Registered name; drives parser dispatch through `RawBlob::source`.
    pub fn name(&self) -> &'static str {
        match self {
            Collector::Get { .. } => "get",
            Collector::Describe { .. } => "describe",
            Collector::Events => "events",
            Collector::Logs { .. } => "logs",
            Collector::Metrics => "metrics",
            Collector::Kubelet => "kubelet",
        }
    }

    /// Create a collector by registered name for the given subject kind.
    pub fn create(name: &str, kind: ResourceKind) -> Option<Self> {
        match name {
            "get" => Some(Collector::Get {
                resource_type: kind.kubectl_name().to_string(),
            }),
            "describe" => Some(Collector::Describe {
                resource_type: kind.kubectl_name().to_string(),
            }),
            "events" => Some(Collector::Events),
            "logs" => Some(Collector::Logs {
                tail_lines: DEFAULT_LOG_TAIL_LINES,
            }),
            "metrics" => Some(Collector::Metrics),
            "kubelet" => Some(Collector::Kubelet),
            _ => None,
        }
    }

    /// Collector names each command dispatches in parallel.
    pub fn names_for_command(command: &str) -> Vec<&'static str> {
        match command {
            "diag" => vec!["get", "describe", "events", "logs"],
            "graph" => vec!["get", "describe"],
            "top" => vec!["get", "metrics", "kubelet"],
            _ => vec!["get"],
        }
    }

    /// Collect raw data for the subject. Never fails hard: on any error the
    /// blob comes back empty with the right source and content type.
    pub async fn collect(&self, runner: &KubectlRunner, subject: &SubjectContext) -> RawBlob {
        match self {
            Collector::Get { resource_type } => self.collect_get(runner, subject, resource_type).await,
            Collector::Describe { resource_type } => {
                self.collect_describe(runner, subject, resource_type).await
            }
            Collector::Events => self.collect_events(runner, subject).await,
            Collector::Logs { tail_lines } => self.collect_logs(runner, subject, *tail_lines).await,
            Collector::Metrics => self.collect_metrics(runner, subject).await,
            Collector::Kubelet => self.collect_kubelet(runner, subject).await,
        }
    }

    async fn collect_get(
        &self,
        runner: &KubectlRunner,
        subject: &SubjectContext,
        resource_type: &str,
    ) -> RawBlob {
        let args: Vec<&str> = if LIST_ONLY_TYPES.contains(&resource_type) || subject.name.is_empty()
        {
            vec!["get", resource_type]
        } else if subject.scope == Scope::Resource {
            vec!["get", resource_type, subject.name.as_str()]
        } else {
            vec!["get", resource_type]
        };
        match runner.run(self.name(), &args, subject, true).await {
            Ok(data) => RawBlob {
                data,
                source: self.name().to_string(),
                content_type: CONTENT_TYPE_JSON.to_string(),
                timestamp: chrono::Utc::now(),
                metadata: Default::default(),
            },
            Err(e) => {
                warn!(
                    "Failed to collect {} for {}: {}",
                    resource_type,
                    subject.full_name(),
                    e
                );
                RawBlob::empty(self.name(), CONTENT_TYPE_JSON)
            }
        }
    }

    async fn collect_describe(
        &self,
        runner: &KubectlRunner,
        subject: &SubjectContext,
        resource_type: &str,
    ) -> RawBlob {
        if subject.name.is_empty() {
            return RawBlob::empty(self.name(), CONTENT_TYPE_TEXT);
        }
        let args = ["describe", resource_type, subject.name.as_str()];
        match runner.run(self.name(), &args, subject, false).await {
            Ok(data) => RawBlob {
                data,
                source: self.name().to_string(),
                content_type: CONTENT_TYPE_TEXT.to_string(),
                timestamp: chrono::Utc::now(),
                metadata: Default::default(),
            },
            Err(e) => {
                warn!("Failed to describe {}: {}", subject.full_name(), e);
                RawBlob::empty(self.name(), CONTENT_TYPE_TEXT)
            }
        }
    }

    async fn collect_events(&self, runner: &KubectlRunner, subject: &SubjectContext) -> RawBlob {
        let field_selector;
        let mut args = vec!["get", "events", "--sort-by=.lastTimestamp"];
        if subject.scope == Scope::Resource && !subject.name.is_empty() {
            field_selector = format!(
                "involvedObject.name={},involvedObject.kind={}",
                subject.name, subject.kind
            );
            args.push("--field-selector");
            args.push(&field_selector);
        }
        match runner.run(self.name(), &args, subject, true).await {
            Ok(data) => RawBlob {
                data,
                source: self.name().to_string(),
                content_type: CONTENT_TYPE_JSON.to_string(),
                timestamp: chrono::Utc::now(),
                metadata: Default::default(),
            },
            Err(e) => {
                warn!("Failed to collect events for {}: {}", subject.full_name(), e);
                RawBlob::empty(self.name(), CONTENT_TYPE_JSON)
            }
        }
    }

    async fn collect_logs(
        &self,
        runner: &KubectlRunner,
        subject: &SubjectContext,
        tail_lines: u32,
    ) -> RawBlob {
        if subject.kind != ResourceKind::Pod || subject.name.is_empty() {
            return RawBlob::empty(self.name(), CONTENT_TYPE_TEXT);
        }
        let tail = format!("--tail={}", tail_lines);
        let args = ["logs", subject.name.as_str(), tail.as_str()];
        match runner.run(self.name(), &args, subject, false).await {
            Ok(data) => RawBlob {
                data,
                source: self.name().to_string(),
                content_type: CONTENT_TYPE_TEXT.to_string(),
                timestamp: chrono::Utc::now(),
                metadata: Default::default(),
            },
            Err(e) => {
                warn!("Failed to collect logs for {}: {}", subject.full_name(), e);
                RawBlob::empty(self.name(), CONTENT_TYPE_TEXT)
            }
        }
    }

    async fn collect_metrics(&self, runner: &KubectlRunner, subject: &SubjectContext) -> RawBlob {
        let args: Vec<&str> = match subject.kind {
            ResourceKind::Pod if !subject.name.is_empty() => {
                vec!["top", "pod", subject.name.as_str()]
            }
            ResourceKind::Node if !subject.name.is_empty() => {
                vec!["top", "node", subject.name.as_str()]
            }
            _ => vec!["top", "pods"],
        };
        match runner.run(self.name(), &args, subject, false).await {
            Ok(data) => RawBlob {
                data,
                source: self.name().to_string(),
                content_type: CONTENT_TYPE_TEXT.to_string(),
                timestamp: chrono::Utc::now(),
                metadata: Default::default(),
            },
            Err(e) => {
                // metrics-server is optional
                info!("Metrics server not available: {}", e);
                RawBlob::empty(self.name(), CONTENT_TYPE_TEXT)
            }
        }
    }

    async fn collect_kubelet(&self, runner: &KubectlRunner, subject: &SubjectContext) -> RawBlob {
        // Namespace flags would interfere with --raw; scrape cluster-wide.
        let mut cluster_subject = subject.clone();
        cluster_subject.namespace = None;

        let nodes = match runner
            .run(self.name(), &["get", "nodes"], &cluster_subject, true)
            .await
        {
            Ok(BlobData::Json(v)) => v,
            Ok(_) => return RawBlob::empty(self.name(), CONTENT_TYPE_TEXT),
            Err(e) => {
                info!("Kubelet metrics scrape unavailable: {}", e);
                return RawBlob::empty(self.name(), CONTENT_TYPE_TEXT);
            }
        };

        let node_names: Vec<String> = nodes
            .get("items")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        item.get("metadata")
                            .and_then(|m| m.get("name"))
                            .and_then(|n| n.as_str())
                            .map(String::from)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let subject_ref = &cluster_subject;
        let scrapes = node_names.iter().map(|node_name| async move {
            let path = format!("/api/v1/nodes/{}/proxy/metrics", node_name);
            match runner
                .run(self.name(), &["get", "--raw", path.as_str()], subject_ref, false)
                .await
            {
                Ok(BlobData::Text(text)) if !text.is_empty() => {
                    Some(format!("# node={}\n{}", node_name, text))
                }
                Ok(_) => None,
                // Forbidden nodes are skipped quietly.
                Err(CollectorError::Rbac(_)) => None,
                Err(e) => {
                    info!("Failed to scrape kubelet metrics for {}: {}", node_name, e);
                    None
                }
            }
        });
        let combined: Vec<String> = join_all(scrapes).await.into_iter().flatten().collect();

        RawBlob::text(self.name(), combined.join("\n"))
    }
}
