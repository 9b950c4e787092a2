use serde_json::json;

use kubectl_smart::models::{BlobData, RawBlob, ResourceKind, ResourceRecord};
use kubectl_smart::parsers::{self, parse_blob};

fn json_blob(source: &str, data: serde_json::Value) -> RawBlob {
    RawBlob::json(source, data)
}

fn text_blob(source: &str, data: &str) -> RawBlob {
    RawBlob::text(source, data.to_string())
}

fn pod_json(name: &str, uid: &str, phase: &str) -> serde_json::Value {
    json!({
        "kind": "Pod",
        "metadata": {
            "name": name,
            "uid": uid,
            "namespace": "default",
            "creationTimestamp": "2024-03-01T12:00:00Z",
            "labels": {"app": "web"},
        },
        "spec": {"nodeName": "node-1"},
        "status": {"phase": phase},
    })
}

#[test]
fn single_pod_parses_with_full_name() {
    let records = parse_blob(&json_blob("get", pod_json("web-1", "uid-1", "Running")));
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.kind, ResourceKind::Pod);
    assert_eq!(record.full_name(), "Pod/default/web-1");
    assert_eq!(record.status.as_deref(), Some("Running"));
    assert_eq!(record.labels.get("app").map(String::as_str), Some("web"));
    assert!(record.creation_timestamp.is_some());
    assert_eq!(record.property_str("spec.nodeName"), Some("node-1"));
}

#[test]
fn list_drops_items_missing_uid() {
    let list = json!({
        "kind": "List",
        "items": [
            pod_json("web-1", "uid-1", "Running"),
            {"kind": "Pod", "metadata": {"name": "no-uid"}},
        ]
    });
    let records = parse_blob(&json_blob("get", list));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "web-1");
}

#[test]
fn unknown_kinds_are_dropped() {
    let records = parse_blob(&json_blob(
        "get",
        json!({"kind": "FlunkResource", "metadata": {"name": "x", "uid": "u"}}),
    ));
    assert!(records.is_empty());
}

#[test]
fn status_normalization_per_kind() {
    let node_ready = json!({
        "kind": "Node",
        "metadata": {"name": "n1", "uid": "node-1"},
        "status": {"conditions": [{"type": "Ready", "status": "True"}]}
    });
    assert_eq!(
        parse_blob(&json_blob("get", node_ready))[0].status.as_deref(),
        Some("Ready")
    );

    let node_not_ready = json!({
        "kind": "Node",
        "metadata": {"name": "n2", "uid": "node-2"},
        "status": {"conditions": [{"type": "Ready", "status": "False"}]}
    });
    assert_eq!(
        parse_blob(&json_blob("get", node_not_ready))[0].status.as_deref(),
        Some("NotReady")
    );

    let deployment = json!({
        "kind": "Deployment",
        "metadata": {"name": "d1", "uid": "dep-1"},
        "status": {"conditions": [{"type": "Available", "status": "False"}]}
    });
    assert_eq!(
        parse_blob(&json_blob("get", deployment))[0].status.as_deref(),
        Some("Unavailable")
    );

    let pvc = json!({
        "kind": "PersistentVolumeClaim",
        "metadata": {"name": "data", "uid": "pvc-1"},
        "status": {"phase": "Bound"}
    });
    assert_eq!(
        parse_blob(&json_blob("get", pvc))[0].status.as_deref(),
        Some("Bound")
    );

    let service = json!({
        "kind": "Service",
        "metadata": {"name": "svc", "uid": "svc-1"},
        "spec": {"selector": {"app": "web"}}
    });
    assert_eq!(
        parse_blob(&json_blob("get", service))[0].status.as_deref(),
        Some("Active")
    );

    let job = json!({
        "kind": "Job",
        "metadata": {"name": "j", "uid": "job-1"},
        "status": {"conditions": [{"type": "Complete", "status": "True"}]}
    });
    assert_eq!(
        parse_blob(&json_blob("get", job))[0].status.as_deref(),
        Some("Complete")
    );
}

#[test]
fn secret_preserves_data_and_type() {
    let secret = json!({
        "kind": "Secret",
        "type": "kubernetes.io/tls",
        "metadata": {"name": "tls-a", "uid": "sec-1", "namespace": "prod"},
        "data": {"tls.crt": "aGVsbG8="}
    });
    let records = parse_blob(&json_blob("get", secret));
    assert_eq!(records[0].property_str("type"), Some("kubernetes.io/tls"));
    let data = records[0].property("data").unwrap().as_object().unwrap();
    assert_eq!(data.get("tls.crt").and_then(|v| v.as_str()), Some("aGVsbG8="));
}

#[test]
fn record_round_trips_through_json() {
    let records = parse_blob(&json_blob("get", pod_json("web-1", "uid-1", "Running")));
    let serialized = serde_json::to_string(&records[0]).unwrap();
    let restored: ResourceRecord = serde_json::from_str(&serialized).unwrap();
    assert_eq!(
        serde_json::to_value(&records[0]).unwrap(),
        serde_json::to_value(&restored).unwrap()
    );
}

#[test]
fn malformed_json_text_yields_nothing() {
    let blob = RawBlob {
        data: BlobData::Text("{not valid json".to_string()),
        source: "get".to_string(),
        content_type: "application/json".to_string(),
        timestamp: chrono::Utc::now(),
        metadata: Default::default(),
    };
    assert!(parse_blob(&blob).is_empty());
}

#[test]
fn oversized_json_is_rejected() {
    let big = format!("{{\"kind\": \"Pod\", \"pad\": \"{}\"}}", "x".repeat(parsers::MAX_JSON_BYTES));
    let blob = RawBlob {
        data: BlobData::Text(big),
        source: "get".to_string(),
        content_type: "application/json".to_string(),
        timestamp: chrono::Utc::now(),
        metadata: Default::default(),
    };
    assert!(parse_blob(&blob).is_empty());
}

#[test]
fn events_parser_extracts_properties() {
    let events = json!({
        "kind": "List",
        "items": [{
            "metadata": {"name": "web-1.ev", "uid": "ev-1", "namespace": "default"},
            "reason": "BackOff",
            "message": "Back-off restarting failed container",
            "type": "Warning",
            "count": 4,
            "involvedObject": {"name": "web-1", "kind": "Pod", "uid": "pod-1"},
            "firstTimestamp": "2024-03-01T12:00:00Z",
            "lastTimestamp": "2024-03-01T12:05:00Z"
        }]
    });
    let records = parse_blob(&json_blob("events", events));
    assert_eq!(records.len(), 1);
    let ev = &records[0];
    assert_eq!(ev.kind, ResourceKind::Event);
    assert_eq!(ev.property_str("reason"), Some("BackOff"));
    assert_eq!(ev.property_f64("count"), Some(4.0));
    assert_eq!(ev.property_str("involvedObject.uid"), Some("pod-1"));
    assert!(ev.creation_timestamp.is_some());
}

#[test]
fn events_without_uid_are_dropped() {
    let events = json!({
        "items": [{"metadata": {"name": "anon"}, "reason": "Failed"}]
    });
    assert!(parse_blob(&json_blob("events", events)).is_empty());
}

#[test]
fn log_parser_filters_and_dedups() {
    let text = "\
2024-03-01T10:00:00Z starting up
2024-03-01T10:00:01Z error: disk failure
2024-03-01T10:00:02Z error: disk failure
2024-03-01T10:00:03Z warning: slow response
2024-03-01T10:00:04Z deprecated flag used, failing over
2024-03-01T10:00:05Z panic: index out of range
";
    let records = parse_blob(&text_blob("logs", text));
    assert_eq!(records.len(), 1);
    let analysis = &records[0];
    assert_eq!(analysis.kind, ResourceKind::LogAnalysis);
    assert_eq!(analysis.status.as_deref(), Some("Analyzed"));
    // Duplicate error deduped by its timestamp-stripped form; warning and
    // deprecated lines ignored.
    assert_eq!(analysis.property_f64("error_count"), Some(2.0));
    assert_eq!(analysis.property_f64("log_count"), Some(6.0));
}

#[test]
fn log_parser_keeps_most_recent_five() {
    let mut lines = String::new();
    for i in 0..8 {
        lines.push_str(&format!("error: failure number {}\n", i));
    }
    let records = parse_blob(&text_blob("logs", &lines));
    let errors = records[0].property("errors").unwrap().as_array().unwrap();
    assert_eq!(errors.len(), 5);
    assert_eq!(errors[0].as_str().unwrap(), "error: failure number 3");
    assert_eq!(errors[4].as_str().unwrap(), "error: failure number 7");
}

#[test]
fn log_parser_silent_on_clean_logs() {
    let records = parse_blob(&text_blob("logs", "all good\nnothing to see\n"));
    assert!(records.is_empty());
}

#[test]
fn top_table_node_and_pod_forms() {
    let node_table = "\
NAME     CPU(cores)   CPU%   MEMORY(bytes)   MEMORY%
node-1   250m         12%    2048Mi          55%
";
    let records = parse_blob(&text_blob("metrics", node_table));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, ResourceKind::Node);
    assert_eq!(records[0].property_str("metrics.cpu_percent"), Some("12"));
    assert_eq!(records[0].property_str("metrics.memory"), Some("2048Mi"));

    let pod_table = "\
NAME    CPU(cores)   MEMORY(bytes)
web-1   100m         256Mi
web-2   200m         512Mi
";
    let records = parse_blob(&text_blob("metrics", pod_table));
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].kind, ResourceKind::Pod);
    assert_eq!(records[1].property_str("metrics.cpu"), Some("200m"));
}

#[test]
fn prometheus_parser_joins_pvc_series() {
    let text = "\
# node=node-1
kubelet_volume_stats_used_bytes{namespace=\"prod\",persistentvolumeclaim=\"data\"} 95000000000
kubelet_volume_stats_capacity_bytes{namespace=\"prod\",persistentvolumeclaim=\"data\"} 100000000000
kubelet_volume_stats_used_bytes{namespace=\"prod\",persistentvolumeclaim=\"orphan\"} 100
some_other_series{namespace=\"prod\"} 1
";
    let records = parse_blob(&text_blob("kubelet", text));
    assert_eq!(records.len(), 1);
    let pvc = &records[0];
    assert_eq!(pvc.kind, ResourceKind::PersistentVolumeClaim);
    assert_eq!(pvc.name, "data");
    assert_eq!(pvc.namespace.as_deref(), Some("prod"));
    assert_eq!(pvc.property_f64("metrics.pvc_used_bytes"), Some(95000000000.0));
    assert_eq!(
        pvc.property_f64("metrics.pvc_capacity_bytes"),
        Some(100000000000.0)
    );
}

#[test]
fn prometheus_parser_ignores_zero_capacity() {
    let text = "\
kubelet_volume_stats_used_bytes{namespace=\"ns\",persistentvolumeclaim=\"p\"} 10
kubelet_volume_stats_capacity_bytes{namespace=\"ns\",persistentvolumeclaim=\"p\"} 0
";
    assert!(parse_blob(&text_blob("kubelet", text)).is_empty());
}

#[test]
fn describe_text_is_a_no_op() {
    let records = parse_blob(&text_blob("describe", "Name: web-1\nStatus: Running\n"));
    assert!(records.is_empty());
}

#[test]
fn parse_all_merges_blob_outputs() {
    let blobs = vec![
        json_blob("get", pod_json("web-1", "uid-1", "Running")),
        text_blob("describe", "Name: web-1"),
        text_blob("logs", "error: boom\n"),
    ];
    let records = parsers::parse_all(&blobs);
    assert_eq!(records.len(), 2);
}
