//! Core data model: resource kinds, the uniform resource record, raw blobs,
//! scored issues, and the typed results the three commands produce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kubernetes resource kinds understood by the analysis engine.
/// Parsers drop anything outside this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Pod,
    Deployment,
    ReplicaSet,
    StatefulSet,
    DaemonSet,
    Job,
    CronJob,
    Service,
    Ingress,
    ConfigMap,
    Secret,
    PersistentVolumeClaim,
    PersistentVolume,
    StorageClass,
    Node,
    Namespace,
    ServiceAccount,
    Role,
    RoleBinding,
    ClusterRole,
    ClusterRoleBinding,
    NetworkPolicy,
    HorizontalPodAutoscaler,
    VerticalPodAutoscaler,
    Endpoints,
    Event,
    /// Pseudo-kind synthesized by the log parser.
    LogAnalysis,
}

impl ResourceKind {
    pub fn from_api_kind(kind: &str) -> Option<Self> {
        let k = match kind {
            "Pod" => Self::Pod,
            "Deployment" => Self::Deployment,
            "ReplicaSet" => Self::ReplicaSet,
            "StatefulSet" => Self::StatefulSet,
            "DaemonSet" => Self::DaemonSet,
            "Job" => Self::Job,
            "CronJob" => Self::CronJob,
            "Service" => Self::Service,
            "Ingress" => Self::Ingress,
            "ConfigMap" => Self::ConfigMap,
            "Secret" => Self::Secret,
            "PersistentVolumeClaim" => Self::PersistentVolumeClaim,
            "PersistentVolume" => Self::PersistentVolume,
            "StorageClass" => Self::StorageClass,
            "Node" => Self::Node,
            "Namespace" => Self::Namespace,
            "ServiceAccount" => Self::ServiceAccount,
            "Role" => Self::Role,
            "RoleBinding" => Self::RoleBinding,
            "ClusterRole" => Self::ClusterRole,
            "ClusterRoleBinding" => Self::ClusterRoleBinding,
            "NetworkPolicy" => Self::NetworkPolicy,
            "HorizontalPodAutoscaler" => Self::HorizontalPodAutoscaler,
            "VerticalPodAutoscaler" => Self::VerticalPodAutoscaler,
            "Endpoints" => Self::Endpoints,
            "Event" => Self::Event,
            "LogAnalysis" => Self::LogAnalysis,
            _ => return None,
        };
        Some(k)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pod => "Pod",
            Self::Deployment => "Deployment",
            Self::ReplicaSet => "ReplicaSet",
            Self::StatefulSet => "StatefulSet",
            Self::DaemonSet => "DaemonSet",
            Self::Job => "Job",
            Self::CronJob => "CronJob",
            Self::Service => "Service",
            Self::Ingress => "Ingress",
            Self::ConfigMap => "ConfigMap",
            Self::Secret => "Secret",
            Self::PersistentVolumeClaim => "PersistentVolumeClaim",
            Self::PersistentVolume => "PersistentVolume",
            Self::StorageClass => "StorageClass",
            Self::Node => "Node",
            Self::Namespace => "Namespace",
            Self::ServiceAccount => "ServiceAccount",
            Self::Role => "Role",
            Self::RoleBinding => "RoleBinding",
            Self::ClusterRole => "ClusterRole",
            Self::ClusterRoleBinding => "ClusterRoleBinding",
            Self::NetworkPolicy => "NetworkPolicy",
            Self::HorizontalPodAutoscaler => "HorizontalPodAutoscaler",
            Self::VerticalPodAutoscaler => "VerticalPodAutoscaler",
            Self::Endpoints => "Endpoints",
            Self::Event => "Event",
            Self::LogAnalysis => "LogAnalysis",
        }
    }

    /// Lowercase plural form accepted by kubectl (e.g. `persistentvolumeclaims`).
    pub fn kubectl_name(&self) -> &'static str {
        match self {
            Self::Pod => "pods",
            Self::Deployment => "deployments",
            Self::ReplicaSet => "replicasets",
            Self::StatefulSet => "statefulsets",
            Self::DaemonSet => "daemonsets",
            Self::Job => "jobs",
            Self::CronJob => "cronjobs",
            Self::Service => "services",
            Self::Ingress => "ingresses",
            Self::ConfigMap => "configmaps",
            Self::Secret => "secrets",
            Self::PersistentVolumeClaim => "persistentvolumeclaims",
            Self::PersistentVolume => "persistentvolumes",
            Self::StorageClass => "storageclasses",
            Self::Node => "nodes",
            Self::Namespace => "namespaces",
            Self::ServiceAccount => "serviceaccounts",
            Self::Role => "roles",
            Self::RoleBinding => "rolebindings",
            Self::ClusterRole => "clusterroles",
            Self::ClusterRoleBinding => "clusterrolebindings",
            Self::NetworkPolicy => "networkpolicies",
            Self::HorizontalPodAutoscaler => "horizontalpodautoscalers",
            Self::VerticalPodAutoscaler => "verticalpodautoscalers",
            Self::Endpoints => "endpoints",
            Self::Event => "events",
            Self::LogAnalysis => "loganalyses",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pod" | "pods" | "po" => Ok(Self::Pod),
            "deployment" | "deployments" | "deploy" => Ok(Self::Deployment),
            "replicaset" | "replicasets" | "rs" => Ok(Self::ReplicaSet),
            "statefulset" | "statefulsets" | "sts" => Ok(Self::StatefulSet),
            "daemonset" | "daemonsets" | "ds" => Ok(Self::DaemonSet),
            "job" | "jobs" => Ok(Self::Job),
            "cronjob" | "cronjobs" | "cj" => Ok(Self::CronJob),
            "service" | "services" | "svc" => Ok(Self::Service),
            "ingress" | "ingresses" | "ing" => Ok(Self::Ingress),
            "configmap" | "configmaps" | "cm" => Ok(Self::ConfigMap),
            "secret" | "secrets" => Ok(Self::Secret),
            "persistentvolumeclaim" | "persistentvolumeclaims" | "pvc" => {
                Ok(Self::PersistentVolumeClaim)
            }
            "persistentvolume" | "persistentvolumes" | "pv" => Ok(Self::PersistentVolume),
            "storageclass" | "storageclasses" | "sc" => Ok(Self::StorageClass),
            "node" | "nodes" | "no" => Ok(Self::Node),
            "namespace" | "namespaces" | "ns" => Ok(Self::Namespace),
            "serviceaccount" | "serviceaccounts" | "sa" => Ok(Self::ServiceAccount),
            _ => Err(format!("Unknown resource kind: {}", s)),
        }
    }
}

/// Normalized view of one Kubernetes object after parsing.
/// Immutable once constructed; `uid` is the graph key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub kind: ResourceKind,
    pub name: String,
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub namespace: Option<String>,
    /// Normalized status (phase / condition summary), per kind.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Preserved spec/status/metadata/data/type subtrees of the original object.
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl ResourceRecord {
    /// `Kind/Namespace/Name`, namespace omitted for cluster-scoped resources.
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}/{}", self.kind, ns, self.name),
            None => format!("{}/{}", self.kind, self.name),
        }
    }

    /// Dotted-path lookup into the properties bag.
    pub fn property(&self, path: &str) -> Option<&serde_json::Value> {
        let mut value = &self.properties;
        for key in path.split('.') {
            match value {
                serde_json::Value::Object(map) => value = map.get(key)?,
                serde_json::Value::Array(arr) => {
                    let idx: usize = key.parse().ok()?;
                    value = arr.get(idx)?;
                }
                _ => return None,
            }
        }
        Some(value)
    }

    pub fn property_str(&self, path: &str) -> Option<&str> {
        self.property(path).and_then(|v| v.as_str())
    }

    pub fn property_f64(&self, path: &str) -> Option<f64> {
        self.property(path).and_then(|v| v.as_f64())
    }

    pub fn has_metrics(&self) -> bool {
        self.property("metrics").is_some()
    }
}

/// Payload of a raw blob: pre-parsed JSON or plain text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlobData {
    Json(serde_json::Value),
    Text(String),
}

impl BlobData {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            BlobData::Json(v) => Some(v),
            BlobData::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            BlobData::Text(s) => Some(s),
            BlobData::Json(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            BlobData::Json(v) => v.is_null() || v.as_object().map(|o| o.is_empty()).unwrap_or(false),
            BlobData::Text(s) => s.trim().is_empty(),
        }
    }
}

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

/// Opaque transport unit between a collector and the parser registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBlob {
    pub data: BlobData,
    /// Logical collector name; drives parser dispatch.
    pub source: String,
    pub content_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl RawBlob {
    pub fn json(source: &str, data: serde_json::Value) -> Self {
        Self {
            data: BlobData::Json(data),
            source: source.to_string(),
            content_type: CONTENT_TYPE_JSON.to_string(),
            timestamp: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn text(source: &str, data: String) -> Self {
        Self {
            data: BlobData::Text(data),
            source: source.to_string(),
            content_type: CONTENT_TYPE_TEXT.to_string(),
            timestamp: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    /// Empty blob with the right source/content-type, used on soft failure.
    pub fn empty(source: &str, content_type: &str) -> Self {
        if content_type == CONTENT_TYPE_JSON {
            Self::json(source, serde_json::Value::Object(Default::default()))
        } else {
            Self::text(source, String::new())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Info,
    Warning,
    Critical,
}

impl IssueSeverity {
    /// Critical ≥90, Warning ≥50, Info otherwise.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::Critical
        } else if score >= 50.0 {
            Self::Warning
        } else {
            Self::Info
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl std::fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scored observation about one resource, derived from an event, a status,
/// or a log pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub resource_uid: String,
    pub title: String,
    pub description: String,
    /// Stable identifier such as `FailedMount` or `StatusPending`.
    pub reason: String,
    pub message: String,
    pub severity: IssueSeverity,
    pub score: f64,
    pub critical_path: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub suggested_actions: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Issue {
    /// Equivalence key used for change detection and root-cause exclusion.
    pub fn equivalence_key(&self) -> (&str, &str, &str) {
        (&self.resource_uid, &self.reason, &self.message)
    }
}

/// Analysis scope of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Resource,
    Namespace,
    Cluster,
}

/// What a command operates on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectContext {
    pub kind: ResourceKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub context: Option<String>,
    pub scope: Scope,
    pub depth: u32,
    /// Per-command timeout in seconds.
    pub timeout: f64,
}

impl SubjectContext {
    pub fn resource(kind: ResourceKind, name: &str, namespace: Option<&str>) -> Self {
        Self {
            kind,
            name: name.to_string(),
            namespace: namespace.map(String::from),
            context: None,
            scope: Scope::Resource,
            depth: 3,
            timeout: 30.0,
        }
    }

    pub fn namespace(name: &str) -> Self {
        Self {
            kind: ResourceKind::Namespace,
            name: name.to_string(),
            namespace: Some(name.to_string()),
            context: None,
            scope: Scope::Namespace,
            depth: 3,
            timeout: 30.0,
        }
    }

    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}/{}", self.kind, ns, self.name),
            None => format!("{}/{}", self.kind, self.name),
        }
    }

    /// Context/namespace flags contributed to every kubectl invocation.
    pub fn kubectl_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(ctx) = &self.context {
            args.push("--context".to_string());
            args.push(ctx.clone());
        }
        if let Some(ns) = &self.namespace {
            args.push("--namespace".to_string());
            args.push(ns.clone());
        }
        args
    }
}

/// Result of the diag command.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisResult {
    pub subject: SubjectContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceRecord>,
    pub issues: Vec<Issue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<Issue>,
    pub contributing_factors: Vec<Issue>,
    pub suggested_actions: Vec<String>,
    pub analysis_duration: f64,
    pub timestamp: DateTime<Utc>,
}

impl DiagnosisResult {
    pub fn has_actionable_issues(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity >= IssueSeverity::Warning)
    }
}

/// Result of the graph command.
#[derive(Debug, Clone, Serialize)]
pub struct GraphAnalysis {
    pub subject: SubjectContext,
    pub ascii_graph: String,
    pub direction: String,
    pub upstream: Vec<String>,
    pub downstream: Vec<String>,
    pub vertex_count: usize,
    pub edge_count: usize,
    pub analysis_duration: f64,
    pub timestamp: DateTime<Utc>,
}

/// One capacity prediction row for the top command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityWarning {
    /// `node_pressure`, `node_capacity`, `pvc_usage`, or `pvc_estimate`.
    pub warning_type: String,
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pressure_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_utilization: Option<f64>,
    pub predicted_utilization: f64,
    /// Hours until the predicted level; 0 means the condition is already active.
    pub forecast_hours: u32,
    pub message: String,
    pub suggested_action: String,
}

/// One certificate row for the top command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateWarning {
    /// `certificate_expiry` or `certificate_reference`.
    pub warning_type: String,
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expiry_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub days_until_expiry: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub secret_name: Option<String>,
    #[serde(default)]
    pub hosts: Vec<String>,
    pub message: String,
    pub suggested_action: String,
}

/// Result of the top command.
#[derive(Debug, Clone, Serialize)]
pub struct TopAnalysis {
    pub subject: SubjectContext,
    pub capacity_warnings: Vec<CapacityWarning>,
    pub certificate_warnings: Vec<CertificateWarning>,
    pub forecast_horizon_hours: u32,
    pub analysis_duration: f64,
    pub timestamp: DateTime<Utc>,
}

/// Tunables shared across the pipeline, with environment overrides.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub collector_timeout: f64,
    pub command_timeout: f64,
    pub cache_ttl_seconds: u64,
    pub colors_enabled: bool,
    pub max_display_issues: usize,
    pub max_suggested_actions: usize,
    pub forecast_horizon_hours: u32,
    pub min_samples_for_forecast: usize,
    pub cert_warning_days: i64,
    pub weights_file: Option<std::path::PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            collector_timeout: 10.0,
            command_timeout: 30.0,
            cache_ttl_seconds: 300,
            colors_enabled: true,
            max_display_issues: 10,
            max_suggested_actions: 5,
            forecast_horizon_hours: 48,
            min_samples_for_forecast: 7,
            cert_warning_days: 14,
            weights_file: None,
        }
    }
}

impl AnalysisConfig {
    /// Defaults overlaid with KUBECTL_SMART_* environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("KUBECTL_SMART_COLORS") {
            config.colors_enabled = v.to_lowercase() == "true";
        }
        if let Ok(v) = std::env::var("KUBECTL_SMART_CACHE_TTL") {
            if let Ok(secs) = v.parse() {
                config.cache_ttl_seconds = secs;
            }
        }
        if let Ok(v) = std::env::var("KUBECTL_SMART_TIMEOUT") {
            if let Ok(secs) = v.parse() {
                config.collector_timeout = secs;
            }
        }
        config
    }
}
