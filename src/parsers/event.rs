//! Parser for Kubernetes event listings. Each event becomes a record of
//! kind `Event` carrying reason, message, type, count, the involved object,
//! and ISO timestamps in its properties bag.

use log::warn;
use serde_json::{json, Value};

use super::{parse_k8s_timestamp, MAX_JSON_BYTES};
use crate::models::{BlobData, RawBlob, ResourceKind, ResourceRecord};

pub fn feed(blob: &RawBlob) -> Vec<ResourceRecord> {
    let parsed;
    let data: &Value = match &blob.data {
        BlobData::Json(v) => v,
        BlobData::Text(s) => {
            if s.len() > MAX_JSON_BYTES {
                warn!("Skipping oversized events blob ({} bytes)", s.len());
                return Vec::new();
            }
            match serde_json::from_str::<Value>(s) {
                Ok(v) => {
                    parsed = v;
                    &parsed
                }
                Err(e) => {
                    warn!("Failed to parse events JSON: {}", e);
                    return Vec::new();
                }
            }
        }
    };

    data.get("items")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(parse_single_event).collect())
        .unwrap_or_default()
}

fn parse_single_event(data: &Value) -> Option<ResourceRecord> {
    let metadata = data.get("metadata")?;
    let uid = metadata.get("uid").and_then(|v| v.as_str()).unwrap_or("");
    if uid.is_empty() {
        return None;
    }
    let name = metadata
        .get("name")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or_else(|| format!("event-{}", &uid[..uid.len().min(8)]));
    let namespace = metadata
        .get("namespace")
        .and_then(|v| v.as_str())
        .map(String::from);

    let reason = data.get("reason").and_then(|v| v.as_str()).unwrap_or("Unknown");
    let message = data.get("message").and_then(|v| v.as_str()).unwrap_or("");
    let event_type = data.get("type").and_then(|v| v.as_str()).unwrap_or("Normal");
    let count = data.get("count").and_then(|v| v.as_u64()).unwrap_or(1);
    let first_timestamp =
        parse_k8s_timestamp(data.get("firstTimestamp").and_then(|v| v.as_str()));
    let last_timestamp = parse_k8s_timestamp(data.get("lastTimestamp").and_then(|v| v.as_str()));

    let properties = json!({
        "reason": reason,
        "message": message,
        "type": event_type,
        "count": count,
        "involvedObject": data.get("involvedObject").cloned().unwrap_or_else(|| json!({})),
        "source": data.get("source").cloned().unwrap_or_else(|| json!({})),
        "firstTimestamp": first_timestamp.map(|t| t.to_rfc3339()),
        "lastTimestamp": last_timestamp.map(|t| t.to_rfc3339()),
    });

    Some(ResourceRecord {
        kind: ResourceKind::Event,
        name,
        uid: uid.to_string(),
        namespace,
        status: Some(event_type.to_string()),
        creation_timestamp: first_timestamp,
        labels: Default::default(),
        annotations: Default::default(),
        properties,
    })
}
