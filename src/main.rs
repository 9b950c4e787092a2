use clap::Parser;
use log::debug;

mod cli;
mod collectors;
mod forecast;
mod graph;
mod models;
mod parsers;
mod pipeline;
mod render;
mod resilience;
mod scoring;
mod utils;
mod validation;

use cli::{Args, Commands, OutputFormat};
use models::{AnalysisConfig, SubjectContext};
use pipeline::{Pipeline, PipelineError};
use render::{render_json, TerminalRenderer};
use validation::{validate_depth, validate_horizon, validate_subject};

fn init_logging() {
    let debug_enabled = std::env::var("KUBECTL_SMART_DEBUG")
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(false);
    let default_level = if debug_enabled { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();

    let config = AnalysisConfig::from_env();
    if !config.colors_enabled {
        colored::control::set_override(false);
    }
    let renderer = TerminalRenderer::new(config.max_display_issues);

    let args = Args::parse();
    // Panics inside the pipeline become a terse exit-2 line, with the
    // original message available under the debug flag.
    let exit_code = match run_command(args, config, &renderer).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", renderer.render_error(&e.to_string()));
            2
        }
    };
    std::process::exit(exit_code);
}

async fn run_command(
    args: Args,
    config: AnalysisConfig,
    renderer: &TerminalRenderer,
) -> anyhow::Result<i32> {
    match args.command {
        Commands::Diag {
            kind,
            name,
            namespace,
            context,
            depth,
            output,
        } => {
            validate_subject(&name, namespace.as_deref(), context.as_deref())?;
            validate_depth(depth)?;
            let mut subject = SubjectContext::resource(kind, &name, namespace.as_deref());
            subject.context = context;
            subject.depth = depth;
            subject.timeout = config.command_timeout;

            let mut pipeline = Pipeline::new(config);
            let handle = tokio::spawn(async move { pipeline.diag(subject).await });
            let outcome = join_pipeline(handle).await?;
            match output {
                OutputFormat::Text => println!("{}", renderer.render_diagnosis(&outcome.result)),
                OutputFormat::Json => println!("{}", render_json(&outcome.result)),
            }
            Ok(outcome.exit_code)
        }

        Commands::Graph {
            kind,
            name,
            namespace,
            context,
            direction,
            depth,
            output,
        } => {
            validate_subject(&name, namespace.as_deref(), context.as_deref())?;
            validate_depth(depth)?;
            let mut subject = SubjectContext::resource(kind, &name, namespace.as_deref());
            subject.context = context;
            subject.depth = depth;
            subject.timeout = config.command_timeout;

            let mut pipeline = Pipeline::new(config);
            let dir = direction.into();
            let handle = tokio::spawn(async move { pipeline.graph(subject, dir).await });
            let outcome = join_pipeline(handle).await?;
            match output {
                OutputFormat::Text => println!("{}", renderer.render_graph(&outcome.result)),
                OutputFormat::Json => println!("{}", render_json(&outcome.result)),
            }
            Ok(outcome.exit_code)
        }

        Commands::Top {
            namespace,
            context,
            horizon,
            output,
        } => {
            validate_subject(&namespace, Some(&namespace), context.as_deref())?;
            validate_horizon(horizon)?;
            let mut subject = SubjectContext::namespace(&namespace);
            subject.context = context;
            subject.timeout = config.command_timeout;

            let mut pipeline = Pipeline::new(config);
            let handle = tokio::spawn(async move { pipeline.top(subject, horizon).await });
            let outcome = join_pipeline(handle).await?;
            match output {
                OutputFormat::Text => println!("{}", renderer.render_top(&outcome.result)),
                OutputFormat::Json => println!("{}", render_json(&outcome.result)),
            }
            Ok(outcome.exit_code)
        }
    }
}

/// Await a spawned pipeline task, converting panics and task failures into
/// pipeline errors so the caller exits 2 with a single line.
async fn join_pipeline<T>(
    handle: tokio::task::JoinHandle<Result<pipeline::CommandOutcome<T>, PipelineError>>,
) -> anyhow::Result<pipeline::CommandOutcome<T>> {
    match handle.await {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(e)) => Err(e.into()),
        Err(join_err) => {
            debug!("Pipeline task failed: {:?}", join_err);
            Err(PipelineError::Internal(format!("analysis failed: {}", join_err)).into())
        }
    }
}
