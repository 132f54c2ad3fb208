// SPDX-License-Identifier: MIT OR Apache-2.0
//! Inspect a saved graph document.
//!
//! Usage: `flowsplice-inspect <workflow.json> [node-id]`
//!
//! Prints the primary pipeline of the document. With a node id, prints the
//! flow of that node as a standalone document instead. Type sets come from
//! the RON file named by `FLOWSPLICE_CONFIG`, if set.

use flowsplice_graph::{extract_flow, resolve, DocumentError, GraphDocument, NodeId, PipelineSelector};
use flowsplice_session::{ConfigError, SessionConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, thiserror::Error)]
enum InspectError {
    #[error("usage: flowsplice-inspect <workflow.json> [node-id]")]
    Usage,
    #[error("invalid node id: {0}")]
    NodeId(String),
    #[error("could not read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn main() -> ExitCode {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "flowsplice=debug".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(std::env::args().skip(1).collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), InspectError> {
    let (path, root) = match args.as_slice() {
        [path] => (PathBuf::from(path), None),
        [path, id] => {
            let id = id.parse().map_err(|_| InspectError::NodeId(id.clone()))?;
            (PathBuf::from(path), Some(NodeId(id)))
        }
        _ => return Err(InspectError::Usage),
    };

    let config = match std::env::var_os("FLOWSPLICE_CONFIG") {
        Some(config_path) => SessionConfig::load(&PathBuf::from(config_path))?,
        None => SessionConfig::default(),
    };

    let text = std::fs::read_to_string(&path).map_err(|source| InspectError::Read {
        path: path.clone(),
        source,
    })?;
    let document = GraphDocument::from_json(&text)?;
    tracing::info!(
        path = %path.display(),
        nodes = document.nodes.len(),
        links = document.links().count(),
        "loaded document"
    );

    if let Some(root) = root {
        let flow = extract_flow(&document, root);
        println!("{}", flow.to_json_pretty()?);
        return Ok(());
    }

    let graph = resolve(&document);
    for diagnostic in graph.diagnostics() {
        println!("warning: {diagnostic}");
    }

    let selector = PipelineSelector::new(config.pipeline);
    match selector.select_primary(&graph) {
        Ok(pipeline) => {
            println!("pivot {}", pipeline.pivot);
            for (depth, layer) in pipeline.node_map.layers().iter().enumerate() {
                let names: Vec<String> = layer
                    .iter()
                    .map(|id| match graph.node(*id) {
                        Some(n) => format!("{id} {}", n.node.node_type),
                        None => id.to_string(),
                    })
                    .collect();
                let marker = if depth == pipeline.node_map.pivot_layer() { "*" } else { " " };
                println!("{marker} {depth:>3}  {}", names.join(", "));
            }
            let steps: Vec<String> = pipeline.steps.iter().map(ToString::to_string).collect();
            println!("steps {}", steps.join(" -> "));
        }
        Err(err) => println!("{err}"),
    }
    Ok(())
}
