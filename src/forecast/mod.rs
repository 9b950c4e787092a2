//! Forecasting: capacity projections for nodes and PVCs, and certificate
//! expiry warnings from Secret-embedded X.509 material. Predictions are
//! clamped to [0, 100]% and only those at or above the actionable threshold
//! reach the result.

pub mod history;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use log::{debug, info};
use x509_parser::certificate::X509Certificate;
use x509_parser::pem::Pem;
use x509_parser::prelude::FromDer;

use crate::models::{CapacityWarning, CertificateWarning, ResourceKind, ResourceRecord};
use crate::utils::quantity::parse_metric_value;

use history::{Sample, SampleHistory};

/// Predictions below this utilization are informational noise and dropped.
const ACTIONABLE_UTILIZATION: f64 = 90.0;

const PRESSURE_CONDITIONS: [&str; 3] = ["DiskPressure", "MemoryPressure", "PIDPressure"];

pub struct ForecastingEngine {
    min_samples: usize,
    horizon_hours: u32,
    cert_warning_days: i64,
    history: Option<SampleHistory>,
}

impl ForecastingEngine {
    pub fn new(
        min_samples: usize,
        horizon_hours: u32,
        cert_warning_days: i64,
        history: Option<SampleHistory>,
    ) -> Self {
        Self {
            min_samples,
            horizon_hours,
            cert_warning_days,
            history,
        }
    }

    pub fn with_defaults(horizon_hours: u32) -> Self {
        Self::new(7, horizon_hours, 14, SampleHistory::at_default_location())
    }

    /// Predict capacity issues for nodes and PVCs over the horizon.
    /// Only predictions with utilization ≥ 90 are returned.
    pub fn predict_capacity(
        &self,
        resources: &[ResourceRecord],
        metrics_records: &[ResourceRecord],
        now: DateTime<Utc>,
    ) -> Vec<CapacityWarning> {
        let mut predictions = Vec::new();

        for node in resources.iter().filter(|r| r.kind == ResourceKind::Node) {
            predictions.extend(self.predict_node(node, metrics_records));
        }

        for pvc in resources
            .iter()
            .filter(|r| r.kind == ResourceKind::PersistentVolumeClaim && !r.has_metrics())
        {
            predictions.extend(self.predict_pvc(pvc, metrics_records, now));
        }

        predictions.retain(|p| p.predicted_utilization >= ACTIONABLE_UTILIZATION);
        predictions
    }

    fn predict_node(
        &self,
        node: &ResourceRecord,
        metrics_records: &[ResourceRecord],
    ) -> Vec<CapacityWarning> {
        let mut predictions = Vec::new();

        // A node already under pressure is an immediate prediction.
        if let Some(conditions) = node.property("status.conditions").and_then(|v| v.as_array()) {
            for condition in conditions {
                let ctype = condition.get("type").and_then(|v| v.as_str()).unwrap_or("");
                let active = condition.get("status").and_then(|v| v.as_str()) == Some("True");
                if active && PRESSURE_CONDITIONS.contains(&ctype) {
                    predictions.push(CapacityWarning {
                        warning_type: "node_pressure".to_string(),
                        resource: node.full_name(),
                        pressure_type: Some(ctype.to_string()),
                        current_utilization: None,
                        predicted_utilization: 95.0,
                        forecast_hours: 0,
                        message: format!("Node already experiencing {}", ctype),
                        suggested_action: format!(
                            "Investigate {} on node {}",
                            ctype.to_lowercase(),
                            node.name
                        ),
                    });
                }
            }
        }

        // Trend projection from collected samples, when any exist.
        let samples: Vec<f64> = metrics_records
            .iter()
            .filter(|m| m.kind == ResourceKind::Node && m.name == node.name)
            .filter_map(|m| {
                m.property_str("metrics.cpu_percent")
                    .map(|v| parse_metric_value(v, "cpu_percent"))
                    .or_else(|| {
                        m.property_str("metrics.cpu")
                            .map(|v| parse_metric_value(v, "cpu_percent"))
                    })
            })
            .collect();

        if samples.len() >= 2 {
            let steps = (self.horizon_hours / 24).max(1);
            let predicted = if samples.len() >= self.min_samples {
                damped_trend_forecast(&samples, steps)
            } else {
                linear_forecast(&samples, steps)
            };
            let predicted = predicted.clamp(0.0, 100.0);
            if predicted >= ACTIONABLE_UTILIZATION {
                predictions.push(CapacityWarning {
                    warning_type: "node_capacity".to_string(),
                    resource: node.full_name(),
                    pressure_type: None,
                    current_utilization: samples.last().copied(),
                    predicted_utilization: predicted,
                    forecast_hours: self.horizon_hours,
                    message: format!("CPU utilization predicted to reach {:.1}%", predicted),
                    suggested_action: "Consider scaling workloads or adding nodes".to_string(),
                });
            }
        }

        predictions
    }

    fn predict_pvc(
        &self,
        pvc: &ResourceRecord,
        metrics_records: &[ResourceRecord],
        now: DateTime<Utc>,
    ) -> Vec<CapacityWarning> {
        // Join with the kubelet scrape by (namespace, claim name).
        let scraped = metrics_records.iter().find(|m| {
            m.kind == ResourceKind::PersistentVolumeClaim
                && m.name == pvc.name
                && m.namespace == pvc.namespace
        });

        let Some(scraped) = scraped else {
            // Without metrics a Bound claim gets a conservative placeholder,
            // which the actionable filter then drops.
            if pvc.status.as_deref() == Some("Bound") {
                return vec![CapacityWarning {
                    warning_type: "pvc_estimate".to_string(),
                    resource: pvc.full_name(),
                    pressure_type: None,
                    current_utilization: None,
                    predicted_utilization: 85.0,
                    forecast_hours: self.horizon_hours,
                    message: format!("PVC {} usage trending upward", pvc.name),
                    suggested_action: format!("Monitor disk usage on PVC {}", pvc.name),
                }];
            }
            return Vec::new();
        };

        let used = scraped.property_f64("metrics.pvc_used_bytes").unwrap_or(0.0);
        let capacity = scraped
            .property_f64("metrics.pvc_capacity_bytes")
            .unwrap_or(0.0);
        if capacity <= 0.0 {
            return Vec::new();
        }
        let current = (used / capacity * 100.0).clamp(0.0, 100.0);

        let key = format!(
            "{}/{}",
            pvc.namespace.as_deref().unwrap_or("default"),
            pvc.name
        );
        let series = match &self.history {
            Some(history) => history.append(&key, Sample { ts: now, util: current }),
            None => vec![Sample { ts: now, util: current }],
        };

        if current >= ACTIONABLE_UTILIZATION {
            return vec![CapacityWarning {
                warning_type: "pvc_usage".to_string(),
                resource: pvc.full_name(),
                pressure_type: None,
                current_utilization: Some(current),
                predicted_utilization: current,
                forecast_hours: 0,
                message: format!("PVC {} is at {:.1}% of capacity", pvc.name, current),
                suggested_action: format!(
                    "Expand PVC {} or clean up data before it fills",
                    pvc.name
                ),
            }];
        }

        // Project the growth rate of the last two observations.
        if series.len() >= 2 {
            let prev = &series[series.len() - 2];
            let last = &series[series.len() - 1];
            let hours = (last.ts - prev.ts).num_seconds() as f64 / 3600.0;
            if hours > 0.0 {
                let slope_per_hour = (last.util - prev.util) / hours;
                let predicted =
                    (last.util + slope_per_hour * self.horizon_hours as f64).clamp(0.0, 100.0);
                debug!(
                    "PVC {} utilization {:.1}% trending {:+.3}%/h, predicted {:.1}%",
                    key, current, slope_per_hour, predicted
                );
                if predicted >= ACTIONABLE_UTILIZATION {
                    return vec![CapacityWarning {
                        warning_type: "pvc_usage".to_string(),
                        resource: pvc.full_name(),
                        pressure_type: None,
                        current_utilization: Some(current),
                        predicted_utilization: predicted,
                        forecast_hours: self.horizon_hours,
                        message: format!(
                            "PVC {} predicted to reach {:.1}% within {}h",
                            pvc.name, predicted, self.horizon_hours
                        ),
                        suggested_action: format!(
                            "Expand PVC {} or clean up data before it fills",
                            pvc.name
                        ),
                    }];
                }
            }
        }

        Vec::new()
    }

    /// Certificate expiry warnings from Secrets, plus Ingress TLS references.
    pub fn predict_certificate_expiry(
        &self,
        resources: &[ResourceRecord],
        now: DateTime<Utc>,
    ) -> Vec<CertificateWarning> {
        let mut warnings = Vec::new();

        for secret in resources.iter().filter(|r| r.kind == ResourceKind::Secret) {
            warnings.extend(self.check_secret(secret, now));
        }
        for ingress in resources.iter().filter(|r| r.kind == ResourceKind::Ingress) {
            warnings.extend(self.check_ingress(ingress));
        }

        warnings
    }

    fn check_secret(&self, secret: &ResourceRecord, now: DateTime<Utc>) -> Vec<CertificateWarning> {
        let secret_type = secret.property_str("type").unwrap_or("");
        if secret_type != "kubernetes.io/tls" && secret_type != "Opaque" {
            return Vec::new();
        }
        let Some(data) = secret.property("data").and_then(|v| v.as_object()) else {
            return Vec::new();
        };
        let Some(cert_b64) = data
            .get("tls.crt")
            .or_else(|| data.get("cert"))
            .and_then(|v| v.as_str())
        else {
            return Vec::new();
        };
        let Ok(cert_bytes) = base64::engine::general_purpose::STANDARD.decode(cert_b64) else {
            info!("Secret {} certificate data is not valid base64", secret.name);
            return Vec::new();
        };

        extract_not_after(&cert_bytes)
            .and_then(|not_after| {
                self.warning_for_expiry(&secret.full_name(), &secret.name, not_after, now)
            })
            .into_iter()
            .collect()
    }

    /// One expiry warning when the certificate is inside the warning window.
    pub fn warning_for_expiry(
        &self,
        resource: &str,
        secret_name: &str,
        not_after: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<CertificateWarning> {
        let days_until_expiry = (not_after - now).num_days();
        if days_until_expiry > self.cert_warning_days {
            return None;
        }
        Some(CertificateWarning {
            warning_type: "certificate_expiry".to_string(),
            resource: resource.to_string(),
            expiry_date: Some(not_after.to_rfc3339()),
            days_until_expiry: Some(days_until_expiry),
            secret_name: Some(secret_name.to_string()),
            hosts: Vec::new(),
            message: format!(
                "TLS certificate in secret {} expires in {} days",
                secret_name, days_until_expiry
            ),
            suggested_action: format!("Renew certificate for secret {}", secret_name),
        })
    }

    fn check_ingress(&self, ingress: &ResourceRecord) -> Vec<CertificateWarning> {
        let Some(tls_configs) = ingress.property("spec.tls").and_then(|v| v.as_array()) else {
            return Vec::new();
        };
        tls_configs
            .iter()
            .filter_map(|tls| {
                let secret_name = tls.get("secretName").and_then(|v| v.as_str())?;
                let hosts: Vec<String> = tls
                    .get("hosts")
                    .and_then(|v| v.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|h| h.as_str().map(String::from))
                            .collect()
                    })
                    .unwrap_or_default();
                Some(CertificateWarning {
                    warning_type: "certificate_reference".to_string(),
                    resource: ingress.full_name(),
                    expiry_date: None,
                    days_until_expiry: None,
                    secret_name: Some(secret_name.to_string()),
                    hosts,
                    message: format!(
                        "Ingress {} references TLS secret {}",
                        ingress.name, secret_name
                    ),
                    suggested_action: format!(
                        "Verify certificate validity for secret {}",
                        secret_name
                    ),
                })
            })
            .collect()
    }
}

/// Parse a certificate's notAfter, trying PEM first then raw DER.
pub fn extract_not_after(cert_bytes: &[u8]) -> Option<DateTime<Utc>> {
    for pem in Pem::iter_from_buffer(cert_bytes).flatten() {
        if let Ok(x509) = pem.parse_x509() {
            return asn1_time_to_chrono(x509.validity().not_after.to_datetime());
        }
    }
    if let Ok((_, x509)) = X509Certificate::from_der(cert_bytes) {
        return asn1_time_to_chrono(x509.validity().not_after.to_datetime());
    }
    info!("Could not parse X.509 certificate material");
    None
}

fn asn1_time_to_chrono(odt: time::OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(odt.unix_timestamp(), 0)
}

/// Linear trend over the most recent three samples, projected `steps` ahead.
fn linear_forecast(values: &[f64], steps: u32) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    if values.len() < 2 {
        return values[values.len() - 1];
    }
    let recent = &values[values.len().saturating_sub(3)..];
    let trend = (recent[recent.len() - 1] - recent[0]) / recent.len() as f64;
    let predicted = values[values.len() - 1] + trend * steps as f64;
    predicted.max(0.0)
}

/// Additive-trend, no-seasonality, damped exponential smoothing.
fn damped_trend_forecast(values: &[f64], steps: u32) -> f64 {
    const ALPHA: f64 = 0.5;
    const BETA: f64 = 0.3;
    const PHI: f64 = 0.9;

    if values.len() < 2 {
        return linear_forecast(values, steps);
    }
    let mut level = values[0];
    let mut trend = values[1] - values[0];
    for &v in &values[1..] {
        let prev_level = level;
        level = ALPHA * v + (1.0 - ALPHA) * (prev_level + PHI * trend);
        trend = BETA * (level - prev_level) + (1.0 - BETA) * PHI * trend;
    }
    let mut damp = 0.0;
    let mut phi_pow = PHI;
    for _ in 0..steps {
        damp += phi_pow;
        phi_pow *= PHI;
    }
    (level + damp * trend).max(0.0)
}
