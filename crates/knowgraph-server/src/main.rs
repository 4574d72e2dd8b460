//! KnowGraph — graph backend server and storage client CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use knowgraph_core::{GraphRecord, KnowGraphConfig};
use knowgraph_ingest::{generate_graph, outline_graph, GenerateOptions};
use knowgraph_server::{build_router, AppState};
use knowgraph_store::local::is_local_id;
use knowgraph_store::{transfer, Outcome, StorageCoordinator};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn resolve_data_dir() -> PathBuf {
    std::env::var("KNOWGRAPH_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

fn print_help() {
    println!("KnowGraph — knowledge graph storage");
    println!();
    println!("Usage: knowgraph [command]");
    println!();
    println!("Commands:");
    println!("  serve                        Start the graph backend (default)");
    println!("  list                         List saved graphs");
    println!("  show <id>                    Print a graph as JSON");
    println!("  import <file>                Import a graph from a JSON file");
    println!("  export <id> <file>           Export a graph to a JSON file");
    println!("  delete <id>                  Delete a graph");
    println!("  generate <name> <text-file>  Build a graph from text and save it");
    println!("  outline <name> <text-file>   Build a graph from numbered headings and save it");
    println!("  help                         Show this help message");
    println!();
    println!("Environment: KNOWGRAPH_API_URL, KNOWGRAPH_DATA_DIR, PORT,");
    println!("             KNOWGRAPH_PROBE_INTERVAL_SECS, KNOWGRAPH_REQUEST_TIMEOUT_SECS");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("serve");

    if matches!(command, "--help" | "-h" | "help") {
        print_help();
        return Ok(());
    }

    let data_dir = resolve_data_dir();
    let config = KnowGraphConfig::from_env(&data_dir)?;

    match (command, &args[1..]) {
        ("serve", []) => serve(config).await,
        ("list", []) => list(&config).await,
        ("show", [id]) => show(&config, id).await,
        ("import", [file]) => import(&config, Path::new(file)).await,
        ("export", [id, file]) => export(&config, id, Path::new(file)).await,
        ("delete", [id]) => delete(&config, id).await,
        ("generate", [name, file]) => generate(&config, name, Path::new(file)).await,
        ("outline", [name, file]) => outline(&config, name, Path::new(file)).await,
        _ => {
            eprintln!("Unknown command: {}. Use 'knowgraph help' for usage.", args.join(" "));
            std::process::exit(1);
        }
    }
}

async fn serve(config: KnowGraphConfig) -> anyhow::Result<()> {
    info!("Data directory: {}", config.data_paths.root.display());

    let state = Arc::new(AppState::from_config(&config));
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("KnowGraph server listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn coordinator(config: &KnowGraphConfig) -> anyhow::Result<StorageCoordinator> {
    let coordinator = StorageCoordinator::connect(config)
        .await
        .context("failed to initialize storage")?;
    eprintln!("Storage mode: {}", coordinator.mode());
    Ok(coordinator)
}

/// Print any transition notice and hand back the value.
fn report<T>(outcome: Outcome<T>) -> T {
    if let Some(notice) = &outcome.notice {
        eprintln!("Notice: {}", notice);
    }
    outcome.value
}

async fn list(config: &KnowGraphConfig) -> anyhow::Result<()> {
    let graphs = report(coordinator(config).await?.list_graphs().await?);
    if graphs.is_empty() {
        println!("No graphs saved.");
    }
    for graph in &graphs {
        let summary = graph.summary();
        let origin = if is_local_id(&summary.id) { "  [local]" } else { "" };
        println!(
            "{}  {}  ({} nodes, {} edges){}",
            summary.id, summary.name, summary.node_count, summary.edge_count, origin
        );
    }
    Ok(())
}

async fn show(config: &KnowGraphConfig, id: &str) -> anyhow::Result<()> {
    let json = report(coordinator(config).await?.export_graph(id).await?);
    println!("{}", json);
    Ok(())
}

async fn import(config: &KnowGraphConfig, file: &Path) -> anyhow::Result<()> {
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let saved = report(coordinator(config).await?.import_graph(&data).await?);
    warn_dangling(&saved);
    println!("Imported {} as {}", saved.name, saved.id.unwrap_or_default());
    Ok(())
}

async fn export(config: &KnowGraphConfig, id: &str, file: &Path) -> anyhow::Result<()> {
    let graph = report(coordinator(config).await?.load_graph(id).await?);
    transfer::write_graph_file(file, &graph)?;
    println!("Exported {} to {}", graph.name, file.display());
    Ok(())
}

async fn delete(config: &KnowGraphConfig, id: &str) -> anyhow::Result<()> {
    if report(coordinator(config).await?.delete_graph(id).await?) {
        println!("Deleted {}", id);
    } else {
        println!("Graph not found: {}", id);
    }
    Ok(())
}

async fn generate(config: &KnowGraphConfig, name: &str, file: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let graph = generate_graph(name, &text, &GenerateOptions::default());
    save_generated(config, &graph).await
}

async fn outline(config: &KnowGraphConfig, name: &str, file: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let graph = outline_graph(name, &text);
    if graph.nodes.is_empty() {
        anyhow::bail!("no numbered headings found in {}", file.display());
    }
    save_generated(config, &graph).await
}

async fn save_generated(config: &KnowGraphConfig, graph: &GraphRecord) -> anyhow::Result<()> {
    let saved = report(coordinator(config).await?.save_graph(graph).await?);
    println!(
        "Saved {} as {} ({} nodes, {} edges)",
        saved.name,
        saved.id.unwrap_or_default(),
        saved.nodes.len(),
        saved.edges.len()
    );
    Ok(())
}

fn warn_dangling(graph: &GraphRecord) {
    for edge in graph.dangling_edges() {
        eprintln!(
            "Warning: edge {} references a missing node ({} -> {})",
            edge.id, edge.source, edge.target
        );
    }
}
