//! Parser for standard Kubernetes resource JSON: a single object or a
//! `List` with an `items` array. Unknown kinds and records missing a name
//! or uid are dropped.

use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{json_within_cap, parse_k8s_timestamp, MAX_JSON_BYTES};
use crate::models::{BlobData, RawBlob, ResourceKind, ResourceRecord};

pub fn feed(blob: &RawBlob) -> Vec<ResourceRecord> {
    let parsed;
    let data: &Value = match &blob.data {
        BlobData::Json(v) => v,
        BlobData::Text(s) => {
            if s.len() > MAX_JSON_BYTES {
                warn!("Skipping oversized JSON blob ({} bytes)", s.len());
                return Vec::new();
            }
            match serde_json::from_str::<Value>(s) {
                Ok(v) => {
                    parsed = v;
                    &parsed
                }
                Err(e) => {
                    warn!("Failed to parse Kubernetes resource JSON: {}", e);
                    return Vec::new();
                }
            }
        }
    };

    if !data.is_object() {
        return Vec::new();
    }
    if !json_within_cap(data) {
        warn!("Skipping oversized JSON blob");
        return Vec::new();
    }

    if data.get("kind").and_then(|k| k.as_str()) == Some("List") {
        data.get("items")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(parse_single).collect())
            .unwrap_or_default()
    } else {
        parse_single(data).into_iter().collect()
    }
}

pub(crate) fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(|v| v.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn parse_single(data: &Value) -> Option<ResourceRecord> {
    let kind_str = data.get("kind").and_then(|k| k.as_str()).unwrap_or("Unknown");
    let Some(kind) = ResourceKind::from_api_kind(kind_str) else {
        debug!("Dropping unknown resource kind {}", kind_str);
        return None;
    };

    let metadata = data.get("metadata")?;
    let name = metadata.get("name").and_then(|v| v.as_str())?;
    let uid = metadata.get("uid").and_then(|v| v.as_str()).unwrap_or("");
    if name.is_empty() || uid.is_empty() {
        debug!("Dropping {} resource missing name or uid", kind_str);
        return None;
    }
    let namespace = metadata
        .get("namespace")
        .and_then(|v| v.as_str())
        .map(String::from);

    let creation_timestamp =
        parse_k8s_timestamp(metadata.get("creationTimestamp").and_then(|v| v.as_str()));
    let labels = string_map(metadata.get("labels"));
    let annotations = string_map(metadata.get("annotations"));
    let status = normalize_status(data, kind);

    // Preserve the interesting subtrees of the original object.
    let mut properties = serde_json::Map::new();
    properties.insert(
        "spec".to_string(),
        data.get("spec").cloned().unwrap_or_else(|| Value::Object(Default::default())),
    );
    properties.insert(
        "status".to_string(),
        data.get("status").cloned().unwrap_or_else(|| Value::Object(Default::default())),
    );
    properties.insert("metadata".to_string(), metadata.clone());
    if let Some(d) = data.get("data") {
        properties.insert("data".to_string(), d.clone());
    }
    if let Some(t) = data.get("type") {
        properties.insert("type".to_string(), t.clone());
    }

    Some(ResourceRecord {
        kind,
        name: name.to_string(),
        uid: uid.to_string(),
        namespace,
        status: Some(status),
        creation_timestamp,
        labels,
        annotations,
        properties: Value::Object(properties),
    })
}

fn condition_status(status: &Value, condition_type: &str) -> Option<bool> {
    status
        .get("conditions")
        .and_then(|v| v.as_array())
        .and_then(|conditions| {
            conditions
                .iter()
                .find(|c| c.get("type").and_then(|t| t.as_str()) == Some(condition_type))
        })
        .map(|c| c.get("status").and_then(|s| s.as_str()) == Some("True"))
}

/// Normalized status string per kind, used for icons and status scoring.
fn normalize_status(data: &Value, kind: ResourceKind) -> String {
    let empty = Value::Object(Default::default());
    let status = data.get("status").unwrap_or(&empty);
    match kind {
        ResourceKind::Pod => status
            .get("phase")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
            .to_string(),
        ResourceKind::Node => match condition_status(status, "Ready") {
            Some(true) => "Ready".to_string(),
            Some(false) => "NotReady".to_string(),
            None => "Unknown".to_string(),
        },
        ResourceKind::Deployment | ResourceKind::StatefulSet | ResourceKind::DaemonSet => {
            match condition_status(status, "Available") {
                Some(true) => "Available".to_string(),
                Some(false) => "Unavailable".to_string(),
                None => "Unknown".to_string(),
            }
        }
        ResourceKind::PersistentVolumeClaim | ResourceKind::PersistentVolume => status
            .get("phase")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
            .to_string(),
        ResourceKind::Job => {
            if condition_status(status, "Complete") == Some(true) {
                "Complete".to_string()
            } else if condition_status(status, "Failed") == Some(true) {
                "Failed".to_string()
            } else {
                "Running".to_string()
            }
        }
        // Services and everything else are considered active by existence.
        _ => "Active".to_string(),
    }
}
