use clap::{Parser, Subcommand, ValueEnum};

use crate::graph::Direction;
use crate::models::ResourceKind;

#[derive(Parser)]
#[command(
    name = "kubectl-smart",
    author,
    version,
    about = "Kubernetes diagnostics: why is it broken, what depends on it, what breaks next",
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

fn parse_kind(s: &str) -> Result<ResourceKind, String> {
    s.parse()
}

#[derive(Subcommand)]
pub enum Commands {
    /// Diagnose why a workload is broken: root cause plus contributing factors
    Diag {
        /// Resource kind (pod, deployment, statefulset, service, ...)
        #[arg(value_parser = parse_kind)]
        kind: ResourceKind,

        /// Resource name
        name: String,

        /// Namespace of the resource
        #[arg(short, long, value_name = "NAMESPACE")]
        namespace: Option<String>,

        /// kubectl context to use
        #[arg(long)]
        context: Option<String>,

        /// Dependency traversal depth
        #[arg(long, default_value_t = 3)]
        depth: u32,

        /// Output format
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Show the dependency graph around a resource
    Graph {
        /// Resource kind (pod, deployment, statefulset, service, ...)
        #[arg(value_parser = parse_kind)]
        kind: ResourceKind,

        /// Resource name
        name: String,

        /// Namespace of the resource
        #[arg(short, long, value_name = "NAMESPACE")]
        namespace: Option<String>,

        /// kubectl context to use
        #[arg(long)]
        context: Option<String>,

        /// Traversal direction
        #[arg(short, long, default_value = "downstream")]
        direction: GraphDirection,

        /// Dependency traversal depth
        #[arg(long, default_value_t = 3)]
        depth: u32,

        /// Output format
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Forecast capacity and certificate problems for a namespace
    Top {
        /// Namespace to analyze
        namespace: String,

        /// kubectl context to use
        #[arg(long)]
        context: Option<String>,

        /// Forecast horizon in hours
        #[arg(long, default_value_t = 48, value_parser = clap::value_parser!(u32).range(1..=168))]
        horizon: u32,

        /// Output format
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum, Debug, Default, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum, Debug, Default, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum GraphDirection {
    Upstream,
    #[default]
    Downstream,
}

impl From<GraphDirection> for Direction {
    fn from(d: GraphDirection) -> Self {
        match d {
            GraphDirection::Upstream => Direction::Upstream,
            GraphDirection::Downstream => Direction::Downstream,
        }
    }
}
