//! Terminal and JSON rendering of command results. The terminal renderer is
//! a thin consumer of the typed results; analysis never depends on it.

use colored::Colorize;

use crate::models::{
    DiagnosisResult, GraphAnalysis, Issue, IssueSeverity, TopAnalysis,
};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

pub struct TerminalRenderer {
    max_display_issues: usize,
}

impl TerminalRenderer {
    pub fn new(max_display_issues: usize) -> Self {
        Self { max_display_issues }
    }

    fn severity_tag(severity: IssueSeverity) -> String {
        match severity {
            IssueSeverity::Critical => "CRITICAL".bright_red().bold().to_string(),
            IssueSeverity::Warning => "WARNING".bright_yellow().bold().to_string(),
            IssueSeverity::Info => "INFO".bright_blue().to_string(),
        }
    }

    fn issue_line(issue: &Issue) -> String {
        let path_marker = if issue.critical_path { " ⛓" } else { "" };
        format!(
            "[{}] {} (score {:.0}){}",
            Self::severity_tag(issue.severity),
            issue.title,
            issue.score,
            path_marker
        )
    }

    pub fn render_diagnosis(&self, result: &DiagnosisResult) -> String {
        let mut out = Vec::new();
        out.push(format!(
            "{} {}",
            "🩺 Diagnosis:".bright_cyan().bold(),
            result.subject.full_name().bright_white()
        ));
        out.push(RULE.bright_cyan().to_string());

        let Some(resource) = &result.resource else {
            out.push(format!(
                "{} Resource {} not found",
                "❌".bright_red(),
                result.subject.full_name()
            ));
            return out.join("\n");
        };

        if let Some(status) = &resource.status {
            out.push(format!("Status: {}", status.bright_white()));
        }
        out.push(String::new());

        match &result.root_cause {
            Some(root) => {
                out.push(format!("{}", "🎯 Root Cause".bright_yellow().bold()));
                out.push(format!("   {}", Self::issue_line(root)));
                if !root.message.is_empty() {
                    out.push(format!("   {}", root.message.dimmed()));
                }
            }
            None => out.push(format!(
                "{} No issues detected",
                "✅".bright_green()
            )),
        }

        if !result.contributing_factors.is_empty() {
            out.push(String::new());
            out.push(format!("{}", "⚠️  Contributing Factors".bright_yellow().bold()));
            for issue in &result.contributing_factors {
                out.push(format!("   - {}", Self::issue_line(issue)));
            }
        }

        let remaining = result.issues.len();
        if remaining > 0 {
            out.push(String::new());
            out.push(format!("{}", "📋 All Issues".bright_yellow().bold()));
            for issue in result.issues.iter().take(self.max_display_issues) {
                out.push(format!("   - {}", Self::issue_line(issue)));
            }
            if remaining > self.max_display_issues {
                out.push(format!(
                    "   … and {} more",
                    remaining - self.max_display_issues
                ));
            }
        }

        if !result.suggested_actions.is_empty() {
            out.push(String::new());
            out.push(format!("{}", "💡 Suggested Actions".bright_green().bold()));
            for (i, action) in result.suggested_actions.iter().enumerate() {
                out.push(format!("   {}. {}", i + 1, action));
            }
        }

        out.push(String::new());
        out.push(format!(
            "⏱  Analysis completed in {:.2}s",
            result.analysis_duration
        ));
        out.join("\n")
    }

    pub fn render_graph(&self, result: &GraphAnalysis) -> String {
        let mut out = Vec::new();
        out.push(format!(
            "{} {} ({})",
            "🕸  Dependency graph:".bright_cyan().bold(),
            result.subject.full_name().bright_white(),
            result.direction
        ));
        out.push(RULE.bright_cyan().to_string());
        out.push(result.ascii_graph.clone());
        out.push(String::new());
        out.push(format!(
            "Upstream: {}   Downstream: {}   (graph: {} vertices, {} edges)",
            result.upstream.len(),
            result.downstream.len(),
            result.vertex_count,
            result.edge_count
        ));
        out.join("\n")
    }

    pub fn render_top(&self, result: &TopAnalysis) -> String {
        let mut out = Vec::new();
        out.push(format!(
            "{} {} (horizon {}h)",
            "🔮 Forecast:".bright_cyan().bold(),
            result.subject.name.bright_white(),
            result.forecast_horizon_hours
        ));
        out.push(RULE.bright_cyan().to_string());

        if result.capacity_warnings.is_empty() && result.certificate_warnings.is_empty() {
            out.push(format!(
                "{} No capacity or certificate issues predicted",
                "✅".bright_green()
            ));
            return out.join("\n");
        }

        if !result.capacity_warnings.is_empty() {
            out.push(format!("{}", "📈 Capacity".bright_yellow().bold()));
            for warning in &result.capacity_warnings {
                let when = if warning.forecast_hours == 0 {
                    "now".to_string()
                } else {
                    format!("in {}h", warning.forecast_hours)
                };
                out.push(format!(
                    "   {} {} → {:.1}% ({})",
                    "🔴".bright_red(),
                    warning.resource,
                    warning.predicted_utilization,
                    when
                ));
                out.push(format!("      {}", warning.message.dimmed()));
                out.push(format!("      ↳ {}", warning.suggested_action));
            }
        }

        if !result.certificate_warnings.is_empty() {
            out.push(format!("{}", "🔐 Certificates".bright_yellow().bold()));
            for warning in &result.certificate_warnings {
                match warning.days_until_expiry {
                    Some(days) => out.push(format!(
                        "   {} {} expires in {} days",
                        "⏳".bright_yellow(),
                        warning.resource,
                        days
                    )),
                    None => out.push(format!("   🔗 {}", warning.message)),
                }
                out.push(format!("      ↳ {}", warning.suggested_action));
            }
        }

        out.join("\n")
    }

    pub fn render_error(&self, message: &str) -> String {
        format!("{} {}", "❌ Error:".bright_red().bold(), message)
    }
}

/// JSON envelopes are the pretty-printed result structs.
pub fn render_json<T: serde::Serialize>(result: &T) -> String {
    serde_json::to_string_pretty(result).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}
