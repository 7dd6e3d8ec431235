use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use trelliscore::{ExecutionEvent, LogLevel, Node, Workflow};
use trellisruntime::{ExecutionGraph, NodeRegistry, RunSession};

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Trellis workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { file, verbose } => {
            let level = if verbose {
                tracing::Level::DEBUG
            } else {
                tracing::Level::WARN
            };
            tracing_subscriber::fmt().with_max_level(level).init();

            run_workflow(file).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }
    }

    Ok(())
}

fn built_in_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    trellisnodes::register_all(&mut registry);
    registry
}

async fn run_workflow(file: PathBuf) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow_json = std::fs::read_to_string(&file)?;
    let workflow: Workflow = serde_json::from_str(&workflow_json)?;

    println!("📋 Workflow: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Connections: {}", workflow.connections.len());
    println!();

    let session = Arc::new(RunSession::new(Arc::new(built_in_registry())));

    // Stream execution events to the terminal as they happen.
    let mut events = session.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::RunStarted { .. } => {
                    println!("▶️  Run started");
                }
                ExecutionEvent::NodeStatusChanged {
                    node_id, status, ..
                } => {
                    println!("  ⚡ {} -> {:?}", node_id, status);
                }
                ExecutionEvent::LogAppended { entry, .. } => {
                    let icon = match entry.level {
                        LogLevel::Info => "ℹ️ ",
                        LogLevel::Success => "✅",
                        LogLevel::Error => "❌",
                        LogLevel::Warning => "⚠️ ",
                    };
                    println!("     {} [{}] {}", icon, entry.source, entry.message);
                }
                ExecutionEvent::RunFinished {
                    status, duration_ms, ..
                } => {
                    println!("🏁 Run finished: {:?} in {}ms", status, duration_ms);
                }
            }
        }
    });

    // Ctrl-C requests cooperative cancellation: in-flight nodes finish,
    // nothing new starts.
    let canceller = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!();
                println!("🛑 Stopping run...");
                session.stop();
            }
        })
    };

    let summary = session.run(&workflow).await?;

    canceller.abort();
    // Give the printer a moment to drain buffered events.
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    printer.abort();

    println!();
    println!("📊 Execution Summary:");
    println!("   Run ID: {}", summary.run_id);
    println!("   Status: {:?}", summary.status);

    let mut node_ids: Vec<_> = summary.node_statuses.keys().collect();
    node_ids.sort();
    for node_id in node_ids {
        let status = summary.node_statuses[node_id];
        let items = summary
            .outputs
            .get(node_id)
            .map(|o| o.total_items())
            .unwrap_or(0);
        println!("   {} {:?} ({} item(s))", node_id, status, items);
    }

    Ok(())
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow_json = std::fs::read_to_string(&file)?;
    let workflow: Workflow = serde_json::from_str(&workflow_json)?;

    workflow.validate()?;

    let graph = ExecutionGraph::new(&workflow)?;
    if graph.entry_nodes().is_empty() {
        anyhow::bail!("workflow has no entry nodes (every node has an inbound connection)");
    }

    let registry = built_in_registry();
    for node in &workflow.nodes {
        if !registry.contains(&node.node_type) {
            anyhow::bail!("unknown node type '{}' on node {}", node.node_type, node.id);
        }
    }
    for conn in &workflow.connections {
        let source = workflow
            .find_node(&conn.source)
            .and_then(|n| registry.get(&n.node_type));
        let target = workflow
            .find_node(&conn.target)
            .and_then(|n| registry.get(&n.node_type));
        if let Some(source) = source {
            if conn.source_output >= source.output_count() {
                anyhow::bail!(
                    "connection {} references output {} of node {}, which declares {} output(s)",
                    conn.id,
                    conn.source_output,
                    conn.source,
                    source.output_count()
                );
            }
        }
        if let Some(target) = target {
            if conn.target_input >= target.input_count() {
                anyhow::bail!(
                    "connection {} references input {} of node {}, which declares {} input(s)",
                    conn.id,
                    conn.target_input,
                    conn.target,
                    target.input_count()
                );
            }
        }
    }

    println!("✅ Workflow is valid:");
    println!("   Name: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Connections: {}", workflow.connections.len());
    println!("   Entry nodes: {}", graph.entry_nodes().len());

    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let registry = built_in_registry();
    for node_type in registry.list_node_types() {
        if let Some(metadata) = registry.metadata(&node_type) {
            println!("  • {} ({})", node_type, metadata.category);
            if !metadata.description.is_empty() {
                println!("    {}", metadata.description);
            }
        } else {
            println!("  • {}", node_type);
        }
    }
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let mut workflow = Workflow::new("example", "Example HTTP Workflow");
    workflow.description = Some("Fetches data from an API and logs the result".to_string());

    workflow.add_node(Node::new("trigger", "trigger.manual").with_name("Start"));
    workflow.add_node(
        Node::new("fetch", "http.request")
            .with_name("Fetch Data")
            .with_config("url", "https://api.github.com/zen")
            .with_config("method", "GET"),
    );
    workflow.add_node(Node::new("log", "debug.log").with_name("Log Response"));

    workflow.connect("trigger", "fetch");
    workflow.connect("fetch", "log");

    let json = serde_json::to_string_pretty(&workflow)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  trellis run --file {}", output.display());

    Ok(())
}
