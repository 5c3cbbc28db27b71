//! # flowgraph
//!
//! Loads a flow graph from a JSON file and runs it with the built-in demo
//! components.
//!
//! ## Quick Start
//! ```bash
//! cargo run -- flow.json --input "hello"
//! cargo run -- flow.json --mermaid
//! ```

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================

/// Configuration management
mod config;

/// Demo component set
mod demo;

// =============================================================================
// IMPORTS
// =============================================================================
use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use flowgraph_engine::{value_to_text, ComponentCache, Graph, RunRequest, RunResult};

use crate::config::Config;
use crate::demo::demo_registry;

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "flowgraph",
    version,
    about = "Run a component flow graph layer by layer",
    long_about = r#"
Loads a graph payload ({"nodes": [...], "edges": [...]}) from a JSON file,
schedules it into layers and builds every vertex with the demo components.

EXAMPLES:
  # Run with a chat input
  flowgraph flow.json --input "What is Rust?"

  # Only build up to a vertex
  flowgraph flow.json --input hi --stop prompt

  # Print the graph as a Mermaid diagram
  flowgraph flow.json --mermaid
"#
)]
struct Args {
    /// Path to the graph payload
    #[arg(value_name = "GRAPH.json")]
    graph: PathBuf,

    /// Value handed to the input vertex
    #[arg(short = 'i', long = "input", value_name = "TEXT")]
    input: Option<String>,

    /// Build only this vertex and its descendants
    #[arg(long = "start", value_name = "ID", conflicts_with = "stop")]
    start: Option<String>,

    /// Build only this vertex and its ancestors
    #[arg(long = "stop", value_name = "ID")]
    stop: Option<String>,

    /// Output vertex to report (repeatable)
    #[arg(short = 'o', long = "output", value_name = "ID")]
    outputs: Vec<String>,

    /// Maximum concurrent builds per layer
    #[arg(short = 'p', long = "parallelism", env = "FLOWGRAPH_PARALLELISM")]
    parallelism: Option<usize>,

    /// Print the graph as a Mermaid diagram instead of running it
    #[arg(long = "mermaid", default_value = "false")]
    mermaid: bool,

    /// Print the run report as JSON
    #[arg(long = "report", default_value = "false")]
    report: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    verbose: bool,
}

impl Args {
    fn run_request(&self) -> RunRequest {
        let mut request = RunRequest::new();
        if let Some(input) = &self.input {
            request = request.with_input_value(Value::String(input.clone()));
        }
        if let Some(start) = &self.start {
            request = request.start_from(start.as_str());
        }
        if let Some(stop) = &self.stop {
            request = request.stop_at(stop.as_str());
        }
        for output in &self.outputs {
            request = request.with_output(output.as_str());
        }
        request
    }
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(parallelism) = args.parallelism {
        config.parallelism = parallelism;
    }
    config.validate()?;

    init_logging(args.verbose, &config.log_level)?;
    info!(
        parallelism = config.parallelism,
        max_layers = config.max_layers,
        "Configuration loaded"
    );

    let mut graph = load_graph(&args.graph, &config)?;

    if args.mermaid {
        println!("{}", graph.to_mermaid());
        return Ok(());
    }

    let mut result = graph.run(args.run_request()).await?;

    println!("{}", render_outputs(&result));
    if args.report {
        let report = serde_json::to_string_pretty(&result.report)
            .context("Failed to serialize run report")?;
        println!("{}", report);
    }

    if let Some(failure) = result.failure.take() {
        error!(error = %failure, "Run failed");
        return Err(failure.into());
    }

    info!(run_id = %result.run_id, "Run completed");
    Ok(())
}

/// Read and validate a graph payload file
fn load_graph(path: &Path, config: &Config) -> Result<Graph> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read graph file {}", path.display()))?;
    let graph = Graph::from_json(
        &json,
        demo_registry(),
        Arc::new(ComponentCache::new()),
        config.engine_config(),
    )
    .with_context(|| format!("Invalid graph in {}", path.display()))?;
    info!(
        flow = %graph.flow_id(),
        vertices = graph.len(),
        edges = graph.edges().len(),
        "Graph loaded"
    );
    Ok(graph)
}

/// One `id: value` line per requested output
fn render_outputs(result: &RunResult) -> String {
    result
        .outputs
        .iter()
        .map(|output| match (&output.value, &output.error) {
            (Some(value), _) => format!("{}: {}", output.vertex_id, value_to_text(value)),
            (None, Some(error)) => format!("{}: <{}>", output.vertex_id, error),
            (None, None) => format!("{}: <no value>", output.vertex_id),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// Install the global subscriber; `--verbose` forces debug output
fn init_logging(verbose: bool, log_level: &str) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("Invalid log filter '{}'", log_level))?
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FLOW: &str = r#"{
        "nodes": [
            {"id": "in", "type": "ChatInput"},
            {"id": "prompt", "type": "Prompt", "params": {"template": "Q: {input}"}},
            {"id": "upper", "type": "Uppercase"},
            {"id": "out", "type": "ChatOutput"}
        ],
        "edges": [
            {"source": "in", "target": "prompt"},
            {"source": "prompt", "target": "upper"},
            {"source": "upper", "target": "out"}
        ]
    }"#;

    fn flow_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["flowgraph", "flow.json"]);
        assert_eq!(args.graph, PathBuf::from("flow.json"));
        assert_eq!(args.input, None);
        assert!(args.outputs.is_empty());
        assert!(!args.mermaid);
        assert!(!args.report);
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_with_flags() {
        let args = Args::parse_from([
            "flowgraph",
            "--input", "hello",
            "--stop", "prompt",
            "-o", "a",
            "-o", "b",
            "--parallelism", "2",
            "--report",
            "--verbose",
            "flow.json",
        ]);

        assert_eq!(args.input.as_deref(), Some("hello"));
        assert_eq!(args.stop.as_deref(), Some("prompt"));
        assert_eq!(args.outputs, vec!["a", "b"]);
        assert_eq!(args.parallelism, Some(2));
        assert!(args.report);
        assert!(args.verbose);

        let request = args.run_request();
        assert_eq!(request.input_value, Some(Value::String("hello".into())));
        assert_eq!(request.stop.as_ref().map(|id| id.as_str()), Some("prompt"));
        assert_eq!(request.outputs.len(), 2);
    }

    #[test]
    fn test_start_and_stop_conflict() {
        let parsed = Args::try_parse_from(["flowgraph", "--start", "a", "--stop", "b", "flow.json"]);
        assert!(parsed.is_err());
    }

    #[tokio::test]
    async fn test_load_and_run_file() {
        let file = flow_file(FLOW);
        let mut graph = load_graph(file.path(), &Config::default()).unwrap();
        assert_eq!(graph.len(), 4);

        let args = Args::parse_from(["flowgraph", "--input", "why", "graph.json"]);
        let result = graph.run(args.run_request()).await.unwrap();
        assert!(result.is_success());
        assert_eq!(render_outputs(&result), "out: Q: WHY");
    }

    #[tokio::test]
    async fn test_render_outputs_marks_missing_values() {
        let file = flow_file(FLOW);
        let mut graph = load_graph(file.path(), &Config::default()).unwrap();

        let args = Args::parse_from(["flowgraph", "--stop", "prompt", "-o", "out", "graph.json"]);
        let result = graph.run(args.run_request()).await.unwrap();
        assert_eq!(render_outputs(&result), "out: <not attempted>");
    }

    #[test]
    fn test_load_errors_carry_path() {
        let missing = load_graph(Path::new("/definitely/not/here.json"), &Config::default());
        assert!(missing.unwrap_err().to_string().contains("here.json"));

        let file = flow_file(r#"{"nodes": [{"id": "a", "type": "Nope"}], "edges": []}"#);
        let err = load_graph(file.path(), &Config::default()).unwrap_err();
        assert!(format!("{err:#}").contains("Nope"));
    }
}
