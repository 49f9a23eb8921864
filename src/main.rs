//! # evrag CLI
//!
//! ## Usage
//!
//! ```bash
//! evrag --config ./config/evrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `evrag init` | Create the SQLite database and run schema migrations |
//! | `evrag import <file>` | Upsert events from a JSON file |
//! | `evrag reindex` | Rebuild the vector index from all stored events |
//! | `evrag ask "<question>"` | Answer a question from the indexed events |
//! | `evrag stats` | Show event and vector counts |
//! | `evrag serve` | Start the HTTP server |
//!
//! Logs go to stderr and are filtered by `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use evrag::{ask, config, import, migrate, reindex, server, stats};

/// evrag: ask questions about an event catalogue.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/evrag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "evrag",
    about = "evrag: retrieval-augmented answers over an event catalogue",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/evrag.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `events` and
    /// `event_vectors` tables. Running it again is a no-op.
    Init,

    /// Import events from a JSON file.
    ///
    /// The file holds an array of events or an object with an `events`
    /// array. Existing events with the same id are replaced.
    Import {
        /// Path to the JSON file.
        file: PathBuf,
    },

    /// Rebuild the vector index from every stored event.
    ///
    /// The previous index stays in place until all chunks are embedded.
    Reindex {
        /// Show event and chunk counts without calling the embedding provider.
        #[arg(long)]
        dry_run: bool,
    },

    /// Ask a question.
    Ask {
        question: String,

        /// Number of distinct events to return.
        #[arg(long)]
        top_k: Option<usize>,

        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show database statistics.
    Stats,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { file } => {
            import::run_import(&cfg, &file).await?;
        }
        Commands::Reindex { dry_run } => {
            reindex::run_reindex(&cfg, dry_run).await?;
        }
        Commands::Ask {
            question,
            top_k,
            json,
        } => {
            ask::run_ask(&cfg, &question, top_k, json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
