//! Parser for `kubectl top` tabular output. The header distinguishes the
//! node table (contains `CPU%`) from the pod table; rows become pseudo
//! records carrying a `metrics` property.

use serde_json::json;

use crate::models::{BlobData, RawBlob, ResourceKind, ResourceRecord};

pub fn feed(blob: &RawBlob) -> Vec<ResourceRecord> {
    let BlobData::Text(text) = &blob.data else {
        return Vec::new();
    };
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() < 2 {
        return Vec::new();
    }

    let is_node_table = lines[0].to_uppercase().contains("CPU%");
    let mut records = Vec::new();

    for line in &lines[1..] {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if is_node_table {
            // NAME CPU(cores) CPU% MEMORY(bytes) MEMORY%
            if parts.len() < 5 {
                continue;
            }
            let name = parts[0];
            let properties = json!({
                "metrics": {
                    "cpu": parts[1],
                    "cpu_percent": parts[2].trim_end_matches('%'),
                    "memory": parts[3],
                    "memory_percent": parts[4].trim_end_matches('%'),
                }
            });
            records.push(ResourceRecord {
                kind: ResourceKind::Node,
                name: name.to_string(),
                uid: format!("metrics-node-{}", name),
                namespace: None,
                status: Some("Active".to_string()),
                creation_timestamp: None,
                labels: Default::default(),
                annotations: Default::default(),
                properties,
            });
        } else {
            // NAME CPU(cores) MEMORY(bytes)
            if parts.len() < 3 {
                continue;
            }
            let name = parts[0];
            let properties = json!({
                "metrics": {
                    "cpu": parts[1],
                    "memory": parts[2],
                }
            });
            records.push(ResourceRecord {
                kind: ResourceKind::Pod,
                name: name.to_string(),
                uid: format!("metrics-{}", name),
                namespace: None,
                status: Some("Active".to_string()),
                creation_timestamp: None,
                labels: Default::default(),
                annotations: Default::default(),
                properties,
            });
        }
    }

    records
}
