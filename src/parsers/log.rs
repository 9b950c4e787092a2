//! Parser for container logs. Filters error-looking lines, deduplicates a
//! timestamp-stripped form, and emits a single `LogAnalysis` pseudo-record
//! with the most recent five unique matches.

use serde_json::json;

use crate::models::{BlobData, RawBlob, ResourceKind, ResourceRecord};

const ERROR_PATTERNS: [&str; 6] = ["error", "exception", "panic", "fatal", "fail", "crash"];
const IGNORE_PATTERNS: [&str; 2] = ["deprecated", "warning"];
const MAX_UNIQUE_ERRORS: usize = 5;

pub fn feed(blob: &RawBlob) -> Vec<ResourceRecord> {
    let BlobData::Text(text) = &blob.data else {
        return Vec::new();
    };
    if text.trim().is_empty() {
        return Vec::new();
    }

    let lines: Vec<&str> = text.lines().collect();
    let mut unique_errors: Vec<String> = Vec::new();
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

    for line in &lines {
        let lower = line.to_lowercase();
        let looks_bad = ERROR_PATTERNS.iter().any(|p| lower.contains(p))
            && !IGNORE_PATTERNS.iter().any(|p| lower.contains(p));
        if !looks_bad {
            continue;
        }
        // Strip a leading ISO-ish timestamp so repeats dedup together.
        let normalized = if line.len() > 20
            && matches!(line.as_bytes().get(19).copied(), Some(b'T') | Some(b' ') | Some(b'Z'))
        {
            line[20..].trim().to_string()
        } else {
            line.trim().to_string()
        };
        if seen.insert(normalized) {
            unique_errors.push(line.trim().to_string());
        }
    }

    if unique_errors.is_empty() {
        return Vec::new();
    }
    // Keep the most recent matches to avoid noise.
    if unique_errors.len() > MAX_UNIQUE_ERRORS {
        unique_errors.drain(..unique_errors.len() - MAX_UNIQUE_ERRORS);
    }

    let properties = json!({
        "errors": unique_errors,
        "log_count": lines.len(),
        "error_count": unique_errors.len(),
    });

    vec![ResourceRecord {
        kind: ResourceKind::LogAnalysis,
        name: "log-analysis".to_string(),
        uid: format!("log-{}", blob.timestamp.timestamp_millis()),
        namespace: None,
        status: Some("Analyzed".to_string()),
        creation_timestamp: Some(blob.timestamp),
        labels: Default::default(),
        annotations: Default::default(),
        properties,
    }]
}
