//! CLI entry point for the pgkg knowledge graph.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use pgkg_core::{KgConfig, Record, RecordId, Triple};
use pgkg_graph::DatabaseHandler;
use pgkg_visualize::GraphVisualizer;

#[derive(Parser)]
#[command(name = "pgkg")]
#[command(about = "Records, triples and graph views on PostgreSQL with Apache AGE")]
struct Cli {
    /// Config file prefix (default: pgkg, i.e. ./pgkg.toml).
    #[arg(short, long, default_value = "pgkg")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect and run the configured DDL.
    Init,

    /// Insert a record (JSON) as a hypertable row and a graph vertex.
    InsertVertex {
        /// Read the record from this file instead of stdin.
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Link two existing vertices.
    InsertEdge {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        relation: String,
        #[arg(long)]
        object: String,
        /// Record that asserted the fact.
        #[arg(long)]
        provenance: Option<String>,
    },

    /// Link two entities mentioned by a stored document.
    InsertEntityTriple {
        #[arg(long)]
        subject: String,
        /// Blank falls back to LINKS_TO.
        #[arg(long, default_value = "")]
        relation: String,
        #[arg(long)]
        object: String,
        #[arg(long)]
        document: String,
    },

    /// Print every node and edge of a graph as JSON.
    Graph {
        /// Graph name (default: the configured schema).
        #[arg(short, long)]
        graph: Option<String>,
    },

    /// Render a graph as Graphviz DOT.
    Plot {
        #[arg(short, long)]
        graph: Option<String>,
        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = KgConfig::load(&cli.config)
        .with_context(|| format!("loading configuration from {}.toml / PGKG__*", cli.config))?;

    init_tracing(config.production);

    let mut handler = DatabaseHandler::new(config)?;
    handler.initialize().await?;

    let outcome = run(&mut handler, cli.command).await;
    handler.close().await?;
    outcome
}

fn init_tracing(production: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if production {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}

async fn run(handler: &mut DatabaseHandler, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Init => {
            tracing::info!(schema = %handler.config().schema_name, "Schema ready");
        }
        Command::InsertVertex { file } => {
            let record = read_record(file.as_deref())?;
            let id = handler.insert_vertex(&record).await?;
            println!("{id}");
        }
        Command::InsertEdge {
            subject,
            relation,
            object,
            provenance,
        } => {
            let mut triple = Triple::new(subject, relation, object);
            if let Some(record) = provenance {
                triple = triple.with_provenance(record);
            }
            handler.insert_edge(&triple).await?;
        }
        Command::InsertEntityTriple {
            subject,
            relation,
            object,
            document,
        } => {
            let (s, o) = handler
                .insert_entity_triple(&subject, &relation, &object, &RecordId::new(document))
                .await?;
            println!("{s}\n{o}");
        }
        Command::Graph { graph } => {
            let viz = visualizer(handler, graph);
            let view = viz.get_graph_data().await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Command::Plot { graph, output } => {
            let viz = visualizer(handler, graph);
            let dot = viz.plot_graph().await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, dot)
                        .with_context(|| format!("writing {}", path.display()))?;
                    tracing::info!(path = %path.display(), graph = %viz.graph_name(), "Graph written");
                }
                None => print!("{dot}"),
            }
        }
    }
    Ok(())
}

fn visualizer(handler: &DatabaseHandler, graph: Option<String>) -> GraphVisualizer<'_> {
    let viz = GraphVisualizer::new(handler);
    match graph {
        Some(name) => viz.for_graph(name),
        None => viz,
    }
}

/// Parse a record from `path`, or from stdin when no path is given.
fn read_record(path: Option<&Path>) -> anyhow::Result<Record> {
    let text = match path {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?,
        None => std::io::read_to_string(std::io::stdin()).context("reading record from stdin")?,
    };
    let record = serde_json::from_str(&text).context("parsing record JSON")?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from([
            "pgkg",
            "--config",
            "deploy/pgkg",
            "insert-edge",
            "--subject",
            "a",
            "--relation",
            "mentions",
            "--object",
            "b",
        ])
        .unwrap();
        assert_eq!(cli.config, "deploy/pgkg");
        assert!(matches!(
            cli.command,
            Command::InsertEdge { ref relation, provenance: None, .. } if relation == "mentions"
        ));

        let cli = Cli::try_parse_from([
            "pgkg",
            "insert-entity-triple",
            "--subject",
            "Rust",
            "--object",
            "Tokio",
            "--document",
            "doc-1",
        ])
        .unwrap();
        assert_eq!(cli.config, "pgkg");
        assert!(matches!(
            cli.command,
            Command::InsertEntityTriple { ref relation, .. } if relation.is_empty()
        ));
    }

    #[test]
    fn plot_takes_output_path() {
        let cli = Cli::try_parse_from(["pgkg", "plot", "-g", "kg_test", "-o", "graph.dot"]).unwrap();
        match cli.command {
            Command::Plot { graph, output } => {
                assert_eq!(graph.as_deref(), Some("kg_test"));
                assert_eq!(output, Some(PathBuf::from("graph.dot")));
            }
            _ => panic!("expected plot"),
        }
    }

    #[test]
    fn missing_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["pgkg"]).is_err());
    }

    #[test]
    fn reads_record_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.json");
        std::fs::write(
            &path,
            r#"{"type": "job_offer", "title": "Rust developer", "id": "job-1", "data": {"city": "Milano"}}"#,
        )
        .unwrap();

        let record = read_record(Some(&path)).unwrap();
        assert_eq!(record.record_type, "job_offer");
        assert_eq!(record.id.as_str(), "job-1");
        assert_eq!(record.data["city"], "Milano");
    }

    #[test]
    fn malformed_record_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"title\": \"no type\"}").unwrap();
        assert!(read_record(Some(&path)).is_err());
    }
}
