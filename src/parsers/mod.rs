//! Parsers convert raw collector blobs into `ResourceRecord`s. They are pure
//! functions of the blob: deterministic, side-effect free, and tolerant of
//! malformed input (returning an empty list rather than failing).

pub mod event;
pub mod log;
pub mod prometheus;
pub mod resource;
pub mod top_table;

use chrono::{DateTime, Utc};

use crate::models::{RawBlob, ResourceRecord, CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT};

/// Safety cap to avoid unbounded parsing of a runaway listing.
pub const MAX_JSON_BYTES: usize = 5 * 1024 * 1024;

/// Dispatch a blob to the right parser by (source, content type).
pub fn parse_blob(blob: &RawBlob) -> Vec<ResourceRecord> {
    match (blob.source.as_str(), blob.content_type.as_str()) {
        ("events", CONTENT_TYPE_JSON) => event::feed(blob),
        ("logs", CONTENT_TYPE_TEXT) => log::feed(blob),
        ("metrics", CONTENT_TYPE_TEXT) => top_table::feed(blob),
        ("kubelet", CONTENT_TYPE_TEXT) => prometheus::feed(blob),
        (_, CONTENT_TYPE_JSON) => resource::feed(blob),
        // describe output and other plain text yields no records
        _ => Vec::new(),
    }
}

/// Parse all blobs through the registry in order.
pub fn parse_all(blobs: &[RawBlob]) -> Vec<ResourceRecord> {
    blobs.iter().flat_map(parse_blob).collect()
}

/// Parse a Kubernetes RFC3339 timestamp, tolerating nanosecond precision.
pub(crate) fn parse_k8s_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    let s = value?.trim();
    if s.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Enforce the JSON size cap on a pre-parsed value by re-measuring its
/// serialized form only when it is obviously large.
pub(crate) fn json_within_cap(value: &serde_json::Value) -> bool {
    // Listings are the only realistic way to exceed the cap.
    let items = value.get("items").and_then(|v| v.as_array());
    match items {
        Some(arr) if arr.len() > 1000 => serde_json::to_string(value)
            .map(|s| s.len() <= MAX_JSON_BYTES)
            .unwrap_or(false),
        _ => true,
    }
}
