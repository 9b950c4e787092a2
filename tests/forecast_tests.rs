use chrono::{Duration, Utc};
use serde_json::json;

use kubectl_smart::forecast::history::{Sample, SampleHistory, MAX_SAMPLES_PER_KEY};
use kubectl_smart::forecast::{extract_not_after, ForecastingEngine};
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

fn engine_with_history(dir: &tempfile::TempDir, horizon: u32) -> ForecastingEngine {
    let history = SampleHistory::new(dir.path().join("metrics.json"));
    ForecastingEngine::new(7, horizon, 14, Some(history))
}

fn pvc_scrape(namespace: &str, name: &str, used: f64, capacity: f64) -> ResourceRecord {
    record(
        ResourceKind::PersistentVolumeClaim,
        name,
        &format!("pvc-metrics-{}-{}", namespace, name),
        Some(namespace),
        "Active",
        json!({"metrics": {"pvc_used_bytes": used, "pvc_capacity_bytes": capacity}}),
    )
}

#[test]
fn node_pressure_triggers_immediate_prediction() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with_history(&dir, 48);
    let node = record(
        ResourceKind::Node,
        "node-1",
        "node-1",
        None,
        "Ready",
        json!({
            "spec": {},
            "status": {"conditions": [
                {"type": "DiskPressure", "status": "True"},
                {"type": "MemoryPressure", "status": "False"},
            ]}
        }),
    );

    let predictions = engine.predict_capacity(&[node], &[], Utc::now());
    assert_eq!(predictions.len(), 1);
    let p = &predictions[0];
    assert_eq!(p.warning_type, "node_pressure");
    assert_eq!(p.pressure_type.as_deref(), Some("DiskPressure"));
    assert_eq!(p.predicted_utilization, 95.0);
    assert_eq!(p.forecast_hours, 0);
}

#[test]
fn healthy_node_produces_no_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with_history(&dir, 48);
    let node = record(
        ResourceKind::Node,
        "node-1",
        "node-1",
        None,
        "Ready",
        json!({
            "spec": {},
            "status": {"conditions": [
                {"type": "DiskPressure", "status": "False"},
                {"type": "Ready", "status": "True"},
            ]}
        }),
    );
    assert!(engine.predict_capacity(&[node], &[], Utc::now()).is_empty());
}

#[test]
fn pvc_at_ninety_five_percent_warns_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with_history(&dir, 48);

    let pvc = record(
        ResourceKind::PersistentVolumeClaim,
        "data",
        "pvc-data",
        Some("prod"),
        "Bound",
        json!({"spec": {}, "status": {}}),
    );
    let scrape = pvc_scrape("prod", "data", 95e9, 100e9);

    let predictions = engine.predict_capacity(&[pvc], &[scrape], Utc::now());
    assert_eq!(predictions.len(), 1);
    let p = &predictions[0];
    assert_eq!(p.warning_type, "pvc_usage");
    assert_eq!(p.predicted_utilization, 95.0);
    assert_eq!(p.forecast_hours, 0);
    assert_eq!(p.current_utilization, Some(95.0));
}

#[test]
fn pvc_trend_projection_crosses_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with_history(&dir, 48);
    let now = Utc::now();

    // An earlier observation at 80% a day ago, 85% now: +5%/24h, so the
    // 48-hour projection lands at 95%.
    let history = SampleHistory::new(dir.path().join("metrics.json"));
    history.append(
        "prod/data",
        Sample {
            ts: now - Duration::hours(24),
            util: 80.0,
        },
    );

    let pvc = record(
        ResourceKind::PersistentVolumeClaim,
        "data",
        "pvc-data",
        Some("prod"),
        "Bound",
        json!({"spec": {}, "status": {}}),
    );
    let scrape = pvc_scrape("prod", "data", 85e9, 100e9);

    let predictions = engine.predict_capacity(&[pvc], &[scrape], now);
    assert_eq!(predictions.len(), 1);
    let p = &predictions[0];
    assert_eq!(p.warning_type, "pvc_usage");
    assert!(p.predicted_utilization >= 90.0);
    assert!(p.predicted_utilization <= 100.0);
    assert_eq!(p.forecast_hours, 48);
}

#[test]
fn projections_clamp_to_one_hundred() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with_history(&dir, 48);
    let now = Utc::now();

    let history = SampleHistory::new(dir.path().join("metrics.json"));
    history.append(
        "prod/data",
        Sample {
            ts: now - Duration::hours(1),
            util: 20.0,
        },
    );

    let pvc = record(
        ResourceKind::PersistentVolumeClaim,
        "data",
        "pvc-data",
        Some("prod"),
        "Bound",
        json!({"spec": {}, "status": {}}),
    );
    let scrape = pvc_scrape("prod", "data", 85e9, 100e9);

    let predictions = engine.predict_capacity(&[pvc], &[scrape], now);
    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0].predicted_utilization, 100.0);
}

#[test]
fn bound_pvc_without_metrics_stays_below_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with_history(&dir, 48);
    let pvc = record(
        ResourceKind::PersistentVolumeClaim,
        "data",
        "pvc-data",
        Some("prod"),
        "Bound",
        json!({"spec": {}, "status": {}}),
    );
    // The conservative 85% estimate exists but never reaches the result.
    assert!(engine.predict_capacity(&[pvc], &[], Utc::now()).is_empty());
}

#[test]
fn cert_warning_at_fourteen_days_but_not_fifteen() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with_history(&dir, 48);
    let now = Utc::now();

    let at_ten = engine.warning_for_expiry("Secret/prod/tls-a", "tls-a", now + Duration::days(10), now);
    let warning = at_ten.expect("10 days out is inside the window");
    assert_eq!(warning.days_until_expiry, Some(10));
    assert_eq!(warning.warning_type, "certificate_expiry");
    assert!(warning.message.contains("expires in 10 days"));

    let at_fourteen =
        engine.warning_for_expiry("Secret/prod/tls-a", "tls-a", now + Duration::days(14), now);
    assert!(at_fourteen.is_some());

    let at_fifteen =
        engine.warning_for_expiry("Secret/prod/tls-b", "tls-b", now + Duration::days(15), now);
    assert!(at_fifteen.is_none());
}

#[test]
fn expired_certificate_reports_negative_days() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with_history(&dir, 48);
    let now = Utc::now();
    let warning = engine
        .warning_for_expiry("Secret/prod/tls-old", "tls-old", now - Duration::days(3), now)
        .unwrap();
    assert_eq!(warning.days_until_expiry, Some(-3));
}

#[test]
fn secrets_with_invalid_cert_material_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with_history(&dir, 48);

    let not_base64 = record(
        ResourceKind::Secret,
        "tls-bad",
        "sec-1",
        Some("prod"),
        "Active",
        json!({"type": "kubernetes.io/tls", "data": {"tls.crt": "!!not-base64!!"}}),
    );
    // Valid base64, but not a certificate.
    let not_a_cert = record(
        ResourceKind::Secret,
        "tls-junk",
        "sec-2",
        Some("prod"),
        "Active",
        json!({"type": "kubernetes.io/tls", "data": {"tls.crt": "aGVsbG8gd29ybGQ="}}),
    );
    let wrong_type = record(
        ResourceKind::Secret,
        "registry-creds",
        "sec-3",
        Some("prod"),
        "Active",
        json!({"type": "kubernetes.io/dockerconfigjson", "data": {"cert": "aGVsbG8="}}),
    );

    let warnings =
        engine.predict_certificate_expiry(&[not_base64, not_a_cert, wrong_type], Utc::now());
    assert!(warnings.is_empty());
}

#[test]
fn ingress_tls_produces_reference_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with_history(&dir, 48);

    let ingress = record(
        ResourceKind::Ingress,
        "web",
        "ing-1",
        Some("prod"),
        "Active",
        json!({
            "spec": {"tls": [
                {"secretName": "web-tls", "hosts": ["example.com", "www.example.com"]}
            ]},
            "status": {}
        }),
    );

    let warnings = engine.predict_certificate_expiry(&[ingress], Utc::now());
    assert_eq!(warnings.len(), 1);
    let w = &warnings[0];
    assert_eq!(w.warning_type, "certificate_reference");
    assert_eq!(w.secret_name.as_deref(), Some("web-tls"));
    assert_eq!(w.hosts, vec!["example.com", "www.example.com"]);
    assert!(w.days_until_expiry.is_none());
}

#[test]
fn garbage_bytes_yield_no_not_after() {
    assert!(extract_not_after(b"definitely not DER or PEM").is_none());
}

#[test]
fn history_appends_in_order_and_caps_series() {
    let dir = tempfile::tempdir().unwrap();
    let history = SampleHistory::new(dir.path().join("metrics.json"));
    let base = Utc::now();

    // Identical samples appended twice are two entries in order.
    let sample = Sample { ts: base, util: 50.0 };
    history.append("ns/pvc", sample);
    let series = history.append("ns/pvc", sample);
    assert_eq!(series.len(), 2);

    for i in 0..(MAX_SAMPLES_PER_KEY + 5) {
        history.append(
            "ns/pvc",
            Sample {
                ts: base + Duration::minutes(i as i64),
                util: i as f64,
            },
        );
    }
    let series = history.series("ns/pvc");
    assert_eq!(series.len(), MAX_SAMPLES_PER_KEY);
    // The most recent samples survive the trim.
    assert_eq!(
        series.last().unwrap().util,
        (MAX_SAMPLES_PER_KEY + 4) as f64
    );

    // The persisted file is always a valid document and the temp file is gone.
    let text = std::fs::read_to_string(dir.path().join("metrics.json")).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert!(doc.get("pvc").is_some());
    assert!(!dir.path().join("metrics.json.tmp").exists());
}

#[test]
fn missing_history_file_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let history = SampleHistory::new(dir.path().join("absent.json"));
    assert!(history.series("ns/pvc").is_empty());
    assert!(history.load().pvc.is_empty());
}

#[test]
fn corrupt_history_file_resets_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.json");
    std::fs::write(&path, "{{{{ not json").unwrap();
    let history = SampleHistory::new(path);
    assert!(history.load().pvc.is_empty());
    let series = history.append(
        "ns/pvc",
        Sample {
            ts: Utc::now(),
            util: 10.0,
        },
    );
    assert_eq!(series.len(), 1);
}
