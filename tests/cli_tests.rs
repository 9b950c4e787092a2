use clap::Parser;

use kubectl_smart::cli::{Args, Commands, GraphDirection, OutputFormat};
use kubectl_smart::models::ResourceKind;

#[test]
fn diag_parses_kind_name_and_namespace() {
    let args = Args::try_parse_from(["kubectl-smart", "diag", "pod", "web-1", "-n", "prod"]).unwrap();
    let Commands::Diag {
        kind,
        name,
        namespace,
        depth,
        output,
        ..
    } = args.command
    else {
        panic!("expected diag");
    };
    assert_eq!(kind, ResourceKind::Pod);
    assert_eq!(name, "web-1");
    assert_eq!(namespace.as_deref(), Some("prod"));
    assert_eq!(depth, 3);
    assert_eq!(output, OutputFormat::Text);
}

#[test]
fn kind_accepts_shorthand_aliases() {
    for (alias, kind) in [
        ("po", ResourceKind::Pod),
        ("deploy", ResourceKind::Deployment),
        ("sts", ResourceKind::StatefulSet),
        ("svc", ResourceKind::Service),
        ("pvc", ResourceKind::PersistentVolumeClaim),
    ] {
        let args = Args::try_parse_from(["kubectl-smart", "diag", alias, "x"]).unwrap();
        let Commands::Diag { kind: parsed, .. } = args.command else {
            panic!("expected diag");
        };
        assert_eq!(parsed, kind, "alias {}", alias);
    }
}

#[test]
fn unknown_kind_is_rejected() {
    assert!(Args::try_parse_from(["kubectl-smart", "diag", "gizmo", "x"]).is_err());
}

#[test]
fn graph_direction_defaults_to_downstream() {
    let args = Args::try_parse_from(["kubectl-smart", "graph", "deployment", "web"]).unwrap();
    let Commands::Graph { direction, .. } = args.command else {
        panic!("expected graph");
    };
    assert_eq!(direction, GraphDirection::Downstream);

    let args =
        Args::try_parse_from(["kubectl-smart", "graph", "deployment", "web", "-d", "upstream"])
            .unwrap();
    let Commands::Graph { direction, .. } = args.command else {
        panic!("expected graph");
    };
    assert_eq!(direction, GraphDirection::Upstream);
}

#[test]
fn top_parses_namespace_and_horizon() {
    let args = Args::try_parse_from(["kubectl-smart", "top", "prod", "--horizon", "72"]).unwrap();
    let Commands::Top {
        namespace, horizon, ..
    } = args.command
    else {
        panic!("expected top");
    };
    assert_eq!(namespace, "prod");
    assert_eq!(horizon, 72);
}

#[test]
fn top_horizon_is_range_checked() {
    assert!(Args::try_parse_from(["kubectl-smart", "top", "prod", "--horizon", "0"]).is_err());
    assert!(Args::try_parse_from(["kubectl-smart", "top", "prod", "--horizon", "169"]).is_err());
    assert!(Args::try_parse_from(["kubectl-smart", "top", "prod", "--horizon", "168"]).is_ok());
}

#[test]
fn json_output_flag_parses() {
    let args =
        Args::try_parse_from(["kubectl-smart", "diag", "pod", "web-1", "--output", "json"]).unwrap();
    let Commands::Diag { output, .. } = args.command else {
        panic!("expected diag");
    };
    assert_eq!(output, OutputFormat::Json);
}
