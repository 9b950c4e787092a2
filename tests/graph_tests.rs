use serde_json::json;

use kubectl_smart::graph::{DependencyGraph, Direction};
use kubectl_smart::models::{ResourceKind, ResourceRecord};

fn record(
    kind: ResourceKind,
    name: &str,
    uid: &str,
    namespace: Option<&str>,
    status: &str,
    properties: serde_json::Value,
) -> ResourceRecord {
    ResourceRecord {
        kind,
        name: name.to_string(),
        uid: uid.to_string(),
        namespace: namespace.map(String::from),
        status: Some(status.to_string()),
        creation_timestamp: None,
        labels: Default::default(),
        annotations: Default::default(),
        properties,
    }
}

/// Deployment → ReplicaSet → Pod, pod on a node with volumes and a service.
fn workload_fixture() -> Vec<ResourceRecord> {
    let deployment = record(
        ResourceKind::Deployment,
        "web",
        "dep-web",
        Some("default"),
        "Available",
        json!({"spec": {}, "status": {}}),
    );
    let replicaset = record(
        ResourceKind::ReplicaSet,
        "web-abc",
        "rs-web",
        Some("default"),
        "Active",
        json!({
            "spec": {},
            "status": {},
            "metadata": {"ownerReferences": [{"kind": "Deployment", "uid": "dep-web"}]}
        }),
    );
    let mut pod = record(
        ResourceKind::Pod,
        "web-abc-1",
        "pod-web",
        Some("default"),
        "Running",
        json!({
            "spec": {
                "nodeName": "node-1",
                "serviceAccountName": "web-sa",
                "volumes": [
                    {"name": "data", "persistentVolumeClaim": {"claimName": "data"}},
                    {"name": "cfg", "configMap": {"name": "web-config"}},
                    {"name": "creds", "secret": {"secretName": "web-tls"}},
                    {"name": "dup", "persistentVolumeClaim": {"claimName": "data"}}
                ]
            },
            "status": {},
            "metadata": {"ownerReferences": [{"kind": "ReplicaSet", "uid": "rs-web"}]}
        }),
    );
    pod.labels.insert("app".to_string(), "web".to_string());

    let node = record(
        ResourceKind::Node,
        "node-1",
        "node-1",
        None,
        "Ready",
        json!({"spec": {}, "status": {}}),
    );
    let pvc = record(
        ResourceKind::PersistentVolumeClaim,
        "data",
        "pvc-data",
        Some("default"),
        "Bound",
        json!({"spec": {}, "status": {"volumeName": "pv-7"}}),
    );
    let pv = record(
        ResourceKind::PersistentVolume,
        "pv-7",
        "pv-7",
        None,
        "Bound",
        json!({"spec": {}, "status": {}}),
    );
    let configmap = record(
        ResourceKind::ConfigMap,
        "web-config",
        "cm-web",
        Some("default"),
        "Active",
        json!({"spec": {}, "status": {}}),
    );
    let secret = record(
        ResourceKind::Secret,
        "web-tls",
        "sec-web",
        Some("default"),
        "Active",
        json!({"spec": {}, "status": {}}),
    );
    let sa = record(
        ResourceKind::ServiceAccount,
        "web-sa",
        "sa-web",
        Some("default"),
        "Active",
        json!({"spec": {}, "status": {}}),
    );
    let service = record(
        ResourceKind::Service,
        "web-svc",
        "svc-web",
        Some("default"),
        "Active",
        json!({"spec": {"selector": {"app": "web"}}, "status": {}}),
    );

    vec![
        deployment, replicaset, pod, node, pvc, pv, configmap, secret, sa, service,
    ]
}

#[test]
fn edges_follow_extraction_rules() {
    let mut graph = DependencyGraph::new();
    graph.add_resources(&workload_fixture());

    assert_eq!(graph.vertex_count(), 10);

    // Deployment owns the ReplicaSet which owns the Pod.
    assert_eq!(graph.dependencies("dep-web", Direction::Downstream), vec!["rs-web"]);
    assert_eq!(graph.dependencies("rs-web", Direction::Downstream), vec!["pod-web"]);

    // Pod edges: scheduled-on node, mounts pvc/cm/secret, uses sa.
    let pod_deps = graph.dependencies("pod-web", Direction::Downstream);
    for target in ["node-1", "pvc-data", "cm-web", "sec-web", "sa-web"] {
        assert!(pod_deps.contains(&target.to_string()), "missing {}", target);
    }
    // The duplicate volume entry must not create a parallel mounts edge.
    assert_eq!(pod_deps.len(), 5);

    // Service selects the pod; PVC binds to the PV.
    assert_eq!(graph.dependencies("svc-web", Direction::Downstream), vec!["pod-web"]);
    assert_eq!(graph.dependencies("pvc-data", Direction::Downstream), vec!["pv-7"]);

    // Upstream of the pod: its owner, and the selecting service.
    let upstream = graph.dependencies("pod-web", Direction::Upstream);
    assert!(upstream.contains(&"rs-web".to_string()));
    assert!(upstream.contains(&"svc-web".to_string()));
}

#[test]
fn statefulset_owns_pods_by_ordinal_name() {
    let sts = record(
        ResourceKind::StatefulSet,
        "db",
        "sts-db",
        Some("default"),
        "Available",
        json!({"spec": {"replicas": 2}, "status": {}}),
    );
    let pod0 = record(
        ResourceKind::Pod,
        "db-0",
        "pod-db-0",
        Some("default"),
        "Running",
        json!({"spec": {}, "status": {}}),
    );
    let pod1 = record(
        ResourceKind::Pod,
        "db-1",
        "pod-db-1",
        Some("default"),
        "Running",
        json!({"spec": {}, "status": {}}),
    );
    // Ordinal beyond replicas is not owned.
    let pod2 = record(
        ResourceKind::Pod,
        "db-2",
        "pod-db-2",
        Some("default"),
        "Running",
        json!({"spec": {}, "status": {}}),
    );

    let mut graph = DependencyGraph::new();
    graph.add_resources(&[sts, pod0, pod1, pod2]);

    let owned = graph.dependencies("sts-db", Direction::Downstream);
    assert_eq!(owned, vec!["pod-db-0", "pod-db-1"]);
}

#[test]
fn relationships_do_not_cross_namespaces() {
    let service = record(
        ResourceKind::Service,
        "svc",
        "svc-1",
        Some("ns-a"),
        "Active",
        json!({"spec": {"selector": {"app": "web"}}, "status": {}}),
    );
    let mut pod = record(
        ResourceKind::Pod,
        "web-1",
        "pod-1",
        Some("ns-b"),
        "Running",
        json!({"spec": {}, "status": {}}),
    );
    pod.labels.insert("app".to_string(), "web".to_string());

    let mut graph = DependencyGraph::new();
    graph.add_resources(&[service, pod]);
    assert!(graph.dependencies("svc-1", Direction::Downstream).is_empty());
}

#[test]
fn missing_endpoints_are_silently_dropped() {
    let pod = record(
        ResourceKind::Pod,
        "lonely",
        "pod-lonely",
        Some("default"),
        "Running",
        json!({
            "spec": {
                "nodeName": "absent-node",
                "volumes": [{"name": "v", "persistentVolumeClaim": {"claimName": "absent"}}]
            },
            "status": {}
        }),
    );
    let mut graph = DependencyGraph::new();
    graph.add_resources(&[pod]);
    assert_eq!(graph.edge_count(), 0);
}

#[test]
fn ascii_tree_shows_hierarchy_and_icons() {
    let mut graph = DependencyGraph::new();
    graph.add_resources(&workload_fixture());

    let tree = graph.to_ascii("dep-web", Direction::Downstream, 3);
    assert!(tree.starts_with("Deployment/default/web"));
    assert!(tree.contains("└─"));
    assert!(tree.contains("ReplicaSet/default/web-abc"));
    assert!(tree.contains("Pod/default/web-abc-1"));
    assert!(tree.contains("🟢"));
}

#[test]
fn ascii_tree_marks_depth_cutoff() {
    let mut graph = DependencyGraph::new();
    graph.add_resources(&workload_fixture());

    // Depth 2 from the deployment stops at the pod, whose dependencies
    // must surface as a cutoff marker rather than vanish.
    let tree = graph.to_ascii("dep-web", Direction::Downstream, 2);
    assert!(tree.contains("Pod/default/web-abc-1"));
    assert!(!tree.contains("Node/node-1"));
    assert!(tree.contains("below depth limit"));
}

#[test]
fn ascii_render_refused_for_oversized_graph() {
    let mut records = Vec::new();
    for i in 0..2001 {
        records.push(record(
            ResourceKind::Node,
            &format!("node-{}", i),
            &format!("node-{}", i),
            None,
            "Ready",
            json!({"spec": {}, "status": {}}),
        ));
    }
    let mut graph = DependencyGraph::new();
    graph.add_resources(&records);
    let output = graph.to_ascii("node-0", Direction::Downstream, 3);
    assert!(output.contains("Graph too large to render"));
    assert!(output.contains("narrowing scope"));
}

#[test]
fn shortest_path_follows_ownership_chain() {
    let mut graph = DependencyGraph::new();
    graph.add_resources(&workload_fixture());

    let path = graph.shortest_path("dep-web", "pv-7");
    assert_eq!(path, vec!["dep-web", "rs-web", "pod-web", "pvc-data", "pv-7"]);

    // Unreachable and unknown endpoints yield an empty path.
    assert!(graph.shortest_path("pv-7", "dep-web").is_empty());
    assert!(graph.shortest_path("dep-web", "nope").is_empty());
}

#[test]
fn stats_reflect_structure() {
    let mut graph = DependencyGraph::new();
    graph.add_resources(&workload_fixture());

    let stats = graph.stats();
    assert_eq!(stats.vertices, 10);
    assert_eq!(stats.edges, 9);
    assert!(stats.is_dag);
    assert_eq!(stats.components, 1);
    assert!(stats.density > 0.0);

    let empty = DependencyGraph::new();
    let stats = empty.stats();
    assert_eq!(stats.vertices, 0);
    assert_eq!(stats.components, 0);
}

#[test]
fn events_never_become_vertices() {
    let ev = record(
        ResourceKind::Event,
        "ev",
        "ev-1",
        Some("default"),
        "Warning",
        json!({"reason": "Failed"}),
    );
    let mut graph = DependencyGraph::new();
    graph.add_resources(&[ev]);
    assert_eq!(graph.vertex_count(), 0);
}

#[test]
fn find_locates_by_kind_name_namespace() {
    let mut graph = DependencyGraph::new();
    graph.add_resources(&workload_fixture());

    assert!(graph
        .find(ResourceKind::Pod, "web-abc-1", Some("default"))
        .is_some());
    assert!(graph.find(ResourceKind::Pod, "web-abc-1", Some("other")).is_none());
    assert!(graph.find(ResourceKind::Node, "node-1", None).is_some());
}
