//! Small Prometheus text parser for the kubelet volume series. Joins
//! `kubelet_volume_stats_used_bytes` and `kubelet_volume_stats_capacity_bytes`
//! by (namespace, persistentvolumeclaim) into one record per PVC.

use serde_json::json;
use std::collections::BTreeMap;

use crate::models::{BlobData, RawBlob, ResourceKind, ResourceRecord};

const USED_SERIES: &str = "kubelet_volume_stats_used_bytes";
const CAPACITY_SERIES: &str = "kubelet_volume_stats_capacity_bytes";

fn parse_labels(label_str: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    for part in label_str.split(',') {
        if let Some((k, v)) = part.split_once('=') {
            labels.insert(
                k.trim().to_string(),
                v.trim().trim_matches('"').to_string(),
            );
        }
    }
    labels
}

pub fn feed(blob: &RawBlob) -> Vec<ResourceRecord> {
    let BlobData::Text(text) = &blob.data else {
        return Vec::new();
    };
    if text.is_empty() {
        return Vec::new();
    }

    // (namespace, pvc) -> (used, capacity)
    let mut pvc_metrics: BTreeMap<(String, String), (Option<f64>, Option<f64>)> = BTreeMap::new();

    for line in text.lines() {
        if line.starts_with('#') || !line.contains('{') || !line.contains('}') {
            continue;
        }
        let Some((metric, rest)) = line.split_once('{') else {
            continue;
        };
        let metric = metric.trim();
        if metric != USED_SERIES && metric != CAPACITY_SERIES {
            continue;
        }
        let Some((labels_str, value_str)) = rest.split_once('}') else {
            continue;
        };
        let Ok(value) = value_str
            .trim()
            .split_whitespace()
            .next()
            .unwrap_or("")
            .parse::<f64>()
        else {
            continue;
        };
        let labels = parse_labels(labels_str);
        let (Some(ns), Some(pvc)) = (labels.get("namespace"), labels.get("persistentvolumeclaim"))
        else {
            continue;
        };
        let entry = pvc_metrics
            .entry((ns.clone(), pvc.clone()))
            .or_insert((None, None));
        if metric == USED_SERIES {
            entry.0 = Some(value);
        } else {
            entry.1 = Some(value);
        }
    }

    pvc_metrics
        .into_iter()
        .filter_map(|((ns, pvc), (used, capacity))| {
            let used = used?;
            let capacity = capacity?;
            if capacity <= 0.0 {
                return None;
            }
            Some(ResourceRecord {
                kind: ResourceKind::PersistentVolumeClaim,
                name: pvc.clone(),
                uid: format!("pvc-metrics-{}-{}", ns, pvc),
                namespace: Some(ns),
                status: Some("Active".to_string()),
                creation_timestamp: None,
                labels: Default::default(),
                annotations: Default::default(),
                properties: json!({
                    "metrics": {
                        "pvc_used_bytes": used,
                        "pvc_capacity_bytes": capacity,
                    }
                }),
            })
        })
        .collect()
}
