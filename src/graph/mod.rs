//! Directed dependency graph over resource records. Vertices are keyed by
//! uid; edges carry a label from a closed set. Built in two passes
//! (vertices, then edges) and read-only afterwards.

use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::models::{ResourceKind, ResourceRecord};

/// Maximum vertices/edges before ASCII rendering is refused.
const MAX_RENDER_VERTICES: usize = 2000;
const MAX_RENDER_EDGES: usize = 5000;

pub const DEFAULT_MAX_DEPTH: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeLabel {
    Owns,
    Mounts,
    ScheduledOn,
    Selects,
    Uses,
    BindsTo,
}

impl EdgeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeLabel::Owns => "owns",
            EdgeLabel::Mounts => "mounts",
            EdgeLabel::ScheduledOn => "scheduled-on",
            EdgeLabel::Selects => "selects",
            EdgeLabel::Uses => "uses",
            EdgeLabel::BindsTo => "binds-to",
        }
    }
}

impl std::fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upstream,
    Downstream,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub vertices: usize,
    pub edges: usize,
    pub density: f64,
    pub is_dag: bool,
    pub components: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edge {
    target: String,
    label: EdgeLabel,
}

/// Adjacency-list dependency graph. Successors are "downstream" (what this
/// resource points at); predecessors are "upstream".
#[derive(Debug, Default)]
pub struct DependencyGraph {
    records: HashMap<String, ResourceRecord>,
    successors: HashMap<String, Vec<Edge>>,
    predecessors: HashMap<String, Vec<Edge>>,
    edge_count: usize,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.records.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn record(&self, uid: &str) -> Option<&ResourceRecord> {
        self.records.get(uid)
    }

    pub fn records(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.records.values()
    }

    /// Find a record by kind, name, and namespace.
    pub fn find(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: Option<&str>,
    ) -> Option<&ResourceRecord> {
        self.records
            .values()
            .find(|r| r.kind == kind && r.name == name && r.namespace.as_deref() == namespace)
    }

    /// Populate the graph: first pass adds vertices, second derives edges.
    pub fn add_resources(&mut self, resources: &[ResourceRecord]) {
        for resource in resources {
            if resource.kind == ResourceKind::Event {
                continue;
            }
            self.records
                .entry(resource.uid.clone())
                .or_insert_with(|| resource.clone());
        }
        for resource in resources {
            if resource.kind == ResourceKind::Event {
                continue;
            }
            for (target, label) in self.extract_relationships(resource) {
                self.add_edge(&resource.uid, &target, label);
            }
        }
    }

    fn add_edge(&mut self, source: &str, target: &str, label: EdgeLabel) {
        if !self.records.contains_key(source) || !self.records.contains_key(target) {
            return;
        }
        let edge = Edge {
            target: target.to_string(),
            label,
        };
        let out = self.successors.entry(source.to_string()).or_default();
        if out.contains(&edge) {
            return;
        }
        out.push(edge);
        self.predecessors
            .entry(target.to_string())
            .or_default()
            .push(Edge {
                target: source.to_string(),
                label,
            });
        self.edge_count += 1;
        debug!(
            "Added edge {} -{}-> {}",
            self.records[source].full_name(),
            label,
            self.records[target].full_name()
        );
    }

    fn find_uid(&self, kind: ResourceKind, name: &str, namespace: Option<&str>) -> Option<String> {
        self.find(kind, name, namespace).map(|r| r.uid.clone())
    }

    /// Derive edges for one record per its kind. Missing endpoints are
    /// silently dropped; relationships never cross namespaces.
    fn extract_relationships(&self, resource: &ResourceRecord) -> Vec<(String, EdgeLabel)> {
        match resource.kind {
            ResourceKind::Pod => self.pod_relationships(resource),
            ResourceKind::Deployment => {
                self.owner_relationships(resource, ResourceKind::ReplicaSet, "Deployment")
            }
            ResourceKind::ReplicaSet => {
                self.owner_relationships(resource, ResourceKind::Pod, "ReplicaSet")
            }
            ResourceKind::DaemonSet => {
                self.owner_relationships(resource, ResourceKind::Pod, "DaemonSet")
            }
            ResourceKind::StatefulSet => self.statefulset_relationships(resource),
            ResourceKind::Service => self.service_relationships(resource),
            ResourceKind::PersistentVolumeClaim => self.pvc_relationships(resource),
            _ => Vec::new(),
        }
    }

    fn pod_relationships(&self, pod: &ResourceRecord) -> Vec<(String, EdgeLabel)> {
        let mut rels = Vec::new();
        let ns = pod.namespace.as_deref();

        if let Some(node_name) = pod.property_str("spec.nodeName") {
            if let Some(uid) = self.find_uid(ResourceKind::Node, node_name, None) {
                rels.push((uid, EdgeLabel::ScheduledOn));
            }
        }

        if let Some(volumes) = pod.property("spec.volumes").and_then(|v| v.as_array()) {
            for volume in volumes {
                if let Some(claim) = volume
                    .get("persistentVolumeClaim")
                    .and_then(|c| c.get("claimName"))
                    .and_then(|n| n.as_str())
                {
                    if let Some(uid) = self.find_uid(ResourceKind::PersistentVolumeClaim, claim, ns)
                    {
                        rels.push((uid, EdgeLabel::Mounts));
                    }
                }
                if let Some(cm) = volume
                    .get("configMap")
                    .and_then(|c| c.get("name"))
                    .and_then(|n| n.as_str())
                {
                    if let Some(uid) = self.find_uid(ResourceKind::ConfigMap, cm, ns) {
                        rels.push((uid, EdgeLabel::Mounts));
                    }
                }
                if let Some(secret) = volume
                    .get("secret")
                    .and_then(|c| c.get("secretName"))
                    .and_then(|n| n.as_str())
                {
                    if let Some(uid) = self.find_uid(ResourceKind::Secret, secret, ns) {
                        rels.push((uid, EdgeLabel::Mounts));
                    }
                }
            }
        }

        let service_account = pod
            .property_str("spec.serviceAccountName")
            .unwrap_or("default");
        if let Some(uid) = self.find_uid(ResourceKind::ServiceAccount, service_account, ns) {
            rels.push((uid, EdgeLabel::Uses));
        }

        rels
    }

    /// Controller-to-child edges discovered through the child's ownerReferences.
    fn owner_relationships(
        &self,
        owner: &ResourceRecord,
        child_kind: ResourceKind,
        owner_kind_name: &str,
    ) -> Vec<(String, EdgeLabel)> {
        self.records
            .values()
            .filter(|r| r.kind == child_kind && r.namespace == owner.namespace)
            .filter(|r| {
                r.property("metadata.ownerReferences")
                    .and_then(|v| v.as_array())
                    .map(|refs| {
                        refs.iter().any(|or| {
                            or.get("kind").and_then(|k| k.as_str()) == Some(owner_kind_name)
                                && or.get("uid").and_then(|u| u.as_str())
                                    == Some(owner.uid.as_str())
                        })
                    })
                    .unwrap_or(false)
            })
            .map(|r| (r.uid.clone(), EdgeLabel::Owns))
            .collect()
    }

    /// StatefulSet pods have predictable ordinal names.
    fn statefulset_relationships(&self, sts: &ResourceRecord) -> Vec<(String, EdgeLabel)> {
        let replicas = sts.property_f64("spec.replicas").unwrap_or(0.0) as u64;
        (0..replicas)
            .filter_map(|i| {
                let pod_name = format!("{}-{}", sts.name, i);
                self.find_uid(ResourceKind::Pod, &pod_name, sts.namespace.as_deref())
                    .map(|uid| (uid, EdgeLabel::Owns))
            })
            .collect()
    }

    fn service_relationships(&self, service: &ResourceRecord) -> Vec<(String, EdgeLabel)> {
        let Some(selector) = service.property("spec.selector").and_then(|v| v.as_object()) else {
            return Vec::new();
        };
        if selector.is_empty() {
            return Vec::new();
        }
        let selector: BTreeMap<&str, &str> = selector
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.as_str(), s)))
            .collect();
        self.records
            .values()
            .filter(|r| r.kind == ResourceKind::Pod && r.namespace == service.namespace)
            .filter(|pod| {
                selector
                    .iter()
                    .all(|(k, v)| pod.labels.get(*k).map(|s| s.as_str()) == Some(*v))
            })
            .map(|pod| (pod.uid.clone(), EdgeLabel::Selects))
            .collect()
    }

    fn pvc_relationships(&self, pvc: &ResourceRecord) -> Vec<(String, EdgeLabel)> {
        pvc.property_str("status.volumeName")
            .and_then(|vol| self.find_uid(ResourceKind::PersistentVolume, vol, None))
            .map(|uid| vec![(uid, EdgeLabel::BindsTo)])
            .unwrap_or_default()
    }

    /// Neighbor uids in the given direction.
    pub fn dependencies(&self, uid: &str, direction: Direction) -> Vec<String> {
        let map = match direction {
            Direction::Downstream => &self.successors,
            Direction::Upstream => &self.predecessors,
        };
        map.get(uid)
            .map(|edges| edges.iter().map(|e| e.target.clone()).collect())
            .unwrap_or_default()
    }

    /// Status icon for the ASCII tree.
    fn status_icon(status: Option<&str>) -> &'static str {
        match status {
            Some("Running") | Some("Active") | Some("Ready") | Some("Available")
            | Some("Bound") | Some("Complete") => "🟢",
            Some("Failed") | Some("Unknown") | Some("NotReady") | Some("Unavailable") => "🔴",
            Some("Pending") => "🟡",
            _ => "⚪",
        }
    }

    /// Indented dependency tree rooted at `root_uid`. Cycles are annotated
    /// once via an in-path visited set; traversal stops at `max_depth`.
    pub fn to_ascii(&self, root_uid: &str, direction: Direction, max_depth: u32) -> String {
        let Some(root) = self.records.get(root_uid) else {
            return format!("Resource {} not found", root_uid);
        };
        if self.vertex_count() > MAX_RENDER_VERTICES || self.edge_count > MAX_RENDER_EDGES {
            return format!(
                "Graph too large to render (vertices={}, edges={}). Try narrowing scope.",
                self.vertex_count(),
                self.edge_count
            );
        }

        let mut lines = vec![root.full_name()];
        let mut visited = HashSet::new();
        visited.insert(root_uid.to_string());
        self.build_ascii_tree(root_uid, direction, &mut lines, "", max_depth, 0, &visited);
        lines.join("\n")
    }

    #[allow(clippy::too_many_arguments)]
    fn build_ascii_tree(
        &self,
        uid: &str,
        direction: Direction,
        lines: &mut Vec<String>,
        prefix: &str,
        max_depth: u32,
        depth: u32,
        visited: &HashSet<String>,
    ) {
        let deps = self.dependencies(uid, direction);
        if depth >= max_depth {
            // Depth cutoff is visible, not silent.
            if !deps.is_empty() {
                lines.push(format!("{}└─ … ({} more below depth limit)", prefix, deps.len()));
            }
            return;
        }
        let last_idx = deps.len().saturating_sub(1);
        for (i, dep_uid) in deps.iter().enumerate() {
            let Some(dep) = self.records.get(dep_uid) else {
                continue;
            };
            let is_last = i == last_idx;
            let connector = if is_last { "└─ " } else { "├─ " };

            if visited.contains(dep_uid) {
                lines.push(format!("{}{}🔄 {} (cycle)", prefix, connector, dep.full_name()));
                continue;
            }

            let icon = Self::status_icon(dep.status.as_deref());
            lines.push(format!("{}{}{} {}", prefix, connector, icon, dep.full_name()));

            let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
            let mut path = visited.clone();
            path.insert(dep_uid.clone());
            self.build_ascii_tree(
                dep_uid,
                direction,
                lines,
                &child_prefix,
                max_depth,
                depth + 1,
                &path,
            );
        }
    }

    /// Best-effort feedback-arc computation: DFS back edges, each returned as
    /// a `[source, target]` pair whose removal would break a cycle.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut cycles = Vec::new();
        let mut state: HashMap<&str, u8> = HashMap::new(); // 0 unvisited, 1 in path, 2 done
        let mut uids: Vec<&String> = self.records.keys().collect();
        uids.sort();

        for start in uids {
            if state.get(start.as_str()).copied().unwrap_or(0) != 0 {
                continue;
            }
            // Iterative DFS with an explicit stack of (uid, next edge index).
            let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];
            state.insert(start.as_str(), 1);
            while let Some((uid, idx)) = stack.pop() {
                let edges = self.successors.get(uid);
                let edge = edges.and_then(|e| e.get(idx));
                match edge {
                    Some(e) => {
                        stack.push((uid, idx + 1));
                        match state.get(e.target.as_str()).copied().unwrap_or(0) {
                            0 => {
                                let target = self.records.get_key_value(&e.target).unwrap().0;
                                state.insert(target.as_str(), 1);
                                stack.push((target.as_str(), 0));
                            }
                            1 => cycles.push(vec![uid.to_string(), e.target.clone()]),
                            _ => {}
                        }
                    }
                    None => {
                        state.insert(uid, 2);
                    }
                }
            }
        }
        cycles
    }

    /// BFS shortest path from `src` to `dst`, or empty when unreachable.
    pub fn shortest_path(&self, src: &str, dst: &str) -> Vec<String> {
        if !self.records.contains_key(src) || !self.records.contains_key(dst) {
            return Vec::new();
        }
        if src == dst {
            return vec![src.to_string()];
        }
        let mut parent: HashMap<&str, &str> = HashMap::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(src);
        while let Some(uid) = queue.pop_front() {
            if let Some(edges) = self.successors.get(uid) {
                for edge in edges {
                    if edge.target == src || parent.contains_key(edge.target.as_str()) {
                        continue;
                    }
                    parent.insert(&edge.target, uid);
                    if edge.target == dst {
                        let mut path = vec![dst.to_string()];
                        let mut cur = dst;
                        while let Some(&p) = parent.get(cur) {
                            path.push(p.to_string());
                            cur = p;
                        }
                        path.reverse();
                        return path;
                    }
                    queue.push_back(&edge.target);
                }
            }
        }
        Vec::new()
    }

    pub fn stats(&self) -> GraphStats {
        let v = self.vertex_count();
        let e = self.edge_count;
        let density = if v > 1 {
            e as f64 / (v as f64 * (v as f64 - 1.0))
        } else {
            0.0
        };
        GraphStats {
            vertices: v,
            edges: e,
            density,
            is_dag: self.find_cycles().is_empty(),
            components: self.component_count(),
        }
    }

    #[cfg(test)]
    pub(crate) fn add_edge_for_test(&mut self, source: &str, target: &str, label: EdgeLabel) {
        self.add_edge(source, target, label);
    }

    /// Weakly connected component count.
    fn component_count(&self) -> usize {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut components = 0;
        for uid in self.records.keys() {
            if seen.contains(uid.as_str()) {
                continue;
            }
            components += 1;
            let mut queue: VecDeque<&str> = VecDeque::new();
            queue.push_back(uid);
            seen.insert(uid);
            while let Some(cur) = queue.pop_front() {
                let neighbors = self
                    .successors
                    .get(cur)
                    .into_iter()
                    .flatten()
                    .chain(self.predecessors.get(cur).into_iter().flatten());
                for edge in neighbors {
                    if seen.insert(&edge.target) {
                        queue.push_back(&edge.target);
                    }
                }
            }
        }
        components
    }
}
