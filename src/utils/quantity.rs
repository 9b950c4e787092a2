//! Parse Kubernetes resource Quantity strings to numeric values for comparison.
//! CPU is parsed to cores, storage/memory to bytes. Unparseable values degrade to zero.

/// Parse a storage quantity string (e.g. "256Mi", "1G", "95e9") to bytes.
/// Both plain and `i`-suffixed units use binary multipliers.
pub fn parse_storage_bytes(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    let lower = s.to_lowercase();
    // Bare numbers first, so scientific notation ("95e9") is not split at the 'e'.
    if let Ok(n) = lower.parse::<f64>() {
        return n;
    }
    let (num_str, unit) = match lower.find(|c: char| c.is_ascii_alphabetic()) {
        Some(idx) => (&lower[..idx], &lower[idx..]),
        None => (lower.as_str(), ""),
    };
    let n: f64 = match num_str.parse() {
        Ok(n) => n,
        Err(_) => return 0.0,
    };
    let multiplier: f64 = match unit {
        "" => 1.0,
        "k" | "ki" => 1024.0,
        "m" | "mi" => 1024.0 * 1024.0,
        "g" | "gi" => 1024.0 * 1024.0 * 1024.0,
        "t" | "ti" => 1024.0_f64.powi(4),
        "p" | "pi" => 1024.0_f64.powi(5),
        _ => return 0.0,
    };
    n * multiplier
}

/// Parse a CPU quantity string (e.g. "250m", "1.5") to cores.
pub fn parse_cpu_cores(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    if let Some(m) = s.strip_suffix('m') {
        return m.parse::<f64>().map(|n| n / 1000.0).unwrap_or(0.0);
    }
    s.parse().unwrap_or(0.0)
}

/// Parse a metric value by name: `cpu` as cores, `memory` as bytes,
/// anything else as a bare float.
pub fn parse_metric_value(value: &str, metric: &str) -> f64 {
    match metric {
        "cpu" => parse_cpu_cores(value),
        "memory" => parse_storage_bytes(value),
        _ => {
            let v = value.trim().trim_end_matches('%');
            v.parse().unwrap_or(0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_suffixes() {
        assert_eq!(parse_storage_bytes("1Ki"), 1024.0);
        assert_eq!(parse_storage_bytes("1Mi"), 1024.0 * 1024.0);
        assert_eq!(parse_storage_bytes("2Gi"), 2.0 * 1024.0 * 1024.0 * 1024.0);
        assert_eq!(parse_storage_bytes("1k"), 1024.0);
        assert_eq!(parse_storage_bytes("100"), 100.0);
        assert_eq!(parse_storage_bytes("95e9"), 95e9);
    }

    #[test]
    fn storage_garbage_is_zero() {
        assert_eq!(parse_storage_bytes(""), 0.0);
        assert_eq!(parse_storage_bytes("abc"), 0.0);
        assert_eq!(parse_storage_bytes("1Xi"), 0.0);
    }

    #[test]
    fn cpu_millicores() {
        assert_eq!(parse_cpu_cores("250m"), 0.25);
        assert_eq!(parse_cpu_cores("2"), 2.0);
        assert_eq!(parse_cpu_cores("bad"), 0.0);
    }

    #[test]
    fn metric_dispatch() {
        assert_eq!(parse_metric_value("500m", "cpu"), 0.5);
        assert_eq!(parse_metric_value("1Gi", "memory"), 1024.0 * 1024.0 * 1024.0);
        assert_eq!(parse_metric_value("85%", "cpu_percent"), 85.0);
    }
}
