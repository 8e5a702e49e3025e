//! # lexrag CLI
//!
//! ## Usage
//!
//! ```bash
//! lexrag --config ./config/lexrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lexrag init` | Create the database and the collection schema |
//! | `lexrag ingest <file>` | Extract, chunk, embed and store one file |
//! | `lexrag ingest-dir <dir>` | Ingest every matching file in a directory |
//! | `lexrag embed "<text>"` | Print the embedding of a text |
//! | `lexrag query "<question>"` | Answer a question from indexed documents |
//! | `lexrag reset` | Delete every indexed record |
//! | `lexrag serve` | Start the HTTP server |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lexrag::app::App;
use lexrag::ingest::{ingest_directory, ingest_file, Outcome};
use lexrag::{config, logging, query, server};
use tracing::warn;

/// lexrag: question answering over legal documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Provider credentials are read from `OPENAI_API_KEY`.
#[derive(Parser)]
#[command(
    name = "lexrag",
    about = "lexrag: retrieval-augmented question answering over legal documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lexrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and the collection schema. Idempotent.
    Init,

    /// Ingest a single PDF or text file.
    Ingest {
        /// Path to the file.
        path: PathBuf,
    },

    /// Ingest every file with a configured extension in a directory.
    ///
    /// Not recursive. Each file is reported separately; a failing file
    /// does not stop the others.
    IngestDir {
        /// Directory to scan.
        dir: PathBuf,
    },

    /// Print the embedding vector for a text as JSON.
    Embed {
        text: String,
    },

    /// Answer a question using the indexed documents.
    Query {
        question: String,

        /// Number of chunks to retrieve (defaults to `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Print the assembled context instead of calling the language model.
        #[arg(long)]
        context_only: bool,
    },

    /// Drop the collection and all records, then recreate an empty schema.
    Reset,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging)?;

    let app = App::open(cfg).await?;

    match cli.command {
        Commands::Init => {
            let created = app.ingestor.ensure_schema().await?;
            if created {
                println!("Created collection '{}'.", app.config.store.collection);
            } else {
                println!("Collection '{}' already exists.", app.config.store.collection);
            }
        }
        Commands::Ingest { path } => {
            app.ingestor.ensure_schema().await?;
            let report = ingest_file(&app.ingestor, &path)
                .await
                .with_context(|| format!("Failed to ingest {}", path.display()))?;
            println!(
                "Indexed {}: {} pages, {} chunks",
                report.source_id, report.pages, report.chunks
            );
        }
        Commands::IngestDir { dir } => {
            app.ingestor.ensure_schema().await?;
            let outcomes = ingest_directory(
                &app.ingestor,
                &dir,
                &app.config.ingest.extensions,
                app.config.ingest.concurrency,
            )
            .await?;

            let mut failed = 0;
            for outcome in &outcomes {
                match &outcome.outcome {
                    Outcome::Indexed(report) => println!(
                        "  ok    {}: {} pages, {} chunks",
                        outcome.filename, report.pages, report.chunks
                    ),
                    Outcome::Failed(detail) => {
                        failed += 1;
                        println!(
                            "  error {}: [{}] {}",
                            outcome.filename, detail.kind, detail.message
                        );
                    }
                }
            }
            println!(
                "Processed {} files: {} indexed, {} failed.",
                outcomes.len(),
                outcomes.len() - failed,
                failed
            );
            if failed > 0 {
                std::process::exit(1);
            }
        }
        Commands::Embed { text } => {
            let vector = app.embedder.embed(&text).await?;
            println!("{}", serde_json::to_string(&vector)?);
        }
        Commands::Query {
            question,
            top_k,
            context_only,
        } => {
            query::run_query(&app, &question, top_k, context_only).await?;
        }
        Commands::Reset => {
            warn!(collection = %app.config.store.collection, "resetting collection");
            app.ingestor.reset().await?;
            println!(
                "{} schema and all data deleted.",
                app.config.store.collection
            );
        }
        Commands::Serve => {
            server::run_server(Arc::new(app)).await?;
        }
    }

    Ok(())
}
