//! seedgraph CLI tool
//!
//! Command-line interface for loading seed documents with seedgraph.
//!
//! ## Commands
//!
//! - `load <documents>...`: Build and save the records described by one or more documents
//! - `types`: List the record types known to the configuration
//!
//! ## State
//!
//! Records are kept in an in-memory store that is restored from, and written back to, a JSON
//! state file (`--state`, default `<content root>/.seedgraph-state.json`). Running `load`
//! twice with `--update` therefore updates the records created by the first run instead of
//! duplicating them.

use clap::{Parser, Subcommand};
use seedgraph::{
    codec::{ExistenceMode, GraphLoader},
    config::SeedConfig,
    store::{FsPayloadStore, MemoryStore},
    subscriber::MenuLinkSubscriber,
};
use std::{path::PathBuf, sync::Arc};

const STATE_FILE: &str = ".seedgraph-state.json";

#[derive(Parser)]
#[command(name = "seedgraph")]
#[command(author, version, about = "A tool for loading declarative seed content", long_about = None)]
struct Cli {
    /// Configuration file with record type definitions
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Content root (overrides the configured one)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load documents from <root>/content
    Load {
        /// Document paths, relative to <root>/content
        documents: Vec<String>,

        /// Load every document under <root>/content
        #[arg(long)]
        all: bool,

        /// Update matching records in place instead of always creating new ones
        #[arg(short, long)]
        update: bool,

        /// Store state file (default: <root>/.seedgraph-state.json)
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// List the configured record types
    Types,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SeedConfig::from_file(path)?,
        None => SeedConfig::default(),
    };
    if let Some(root) = cli.root {
        config.content_root = root;
    }

    match cli.command {
        Commands::Types => {
            for name in config.schemas().list_schemas() {
                println!("{name}");
            }
            Ok(())
        }

        Commands::Load {
            documents,
            all,
            update,
            state,
        } => {
            let state_path = state.unwrap_or_else(|| config.content_root.join(STATE_FILE));
            let store = Arc::new(MemoryStore::from_snapshot(config.schemas(), &state_path)?);
            let payloads = Arc::new(FsPayloadStore::new(config.public_root(), store.clone()));
            let mut loader = GraphLoader::new(&config.content_root, store.clone(), payloads);
            if !config.menu_link_types.is_empty() {
                loader.subscribe(Arc::new(MenuLinkSubscriber::new(
                    config.menu_link_types.iter().cloned(),
                )));
            }

            let documents = if all {
                loader.list_documents()?
            } else {
                documents
            };
            if documents.is_empty() {
                eprintln!("Error: no documents given (pass document paths or --all)");
                std::process::exit(2);
            }

            let mode = if update {
                ExistenceMode::CheckAndUpdate
            } else {
                config.mode()
            };

            let mut failed = false;
            for document in documents.iter() {
                match loader.load(document, mode) {
                    Ok(records) => {
                        println!("✓ {document}: {} records", records.len());
                        for record in records.iter() {
                            println!("    {}", record.label());
                        }
                    }
                    Err(e) => {
                        eprintln!("✗ {document}: {e}");
                        failed = true;
                        break;
                    }
                }
            }

            // Records saved before a failure stay saved
            store.write_snapshot(&state_path)?;
            if failed {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
