//! # Jotbox CLI (`jot`)
//!
//! The `jot` binary is the primary interface for Jotbox. It provides
//! commands for database initialization, note capture, triage, review,
//! and starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! jot --config ./config/jot.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `jot init` | Create the SQLite database and run schema migrations |
//! | `jot add "<text>"` | Capture a new note into the inbox |
//! | `jot list` | List items, optionally filtered by state |
//! | `jot show <id>` | Print a full item with its suggestion |
//! | `jot triage` | Classify pending items and park them for approval |
//! | `jot approve <id>` | Accept a suggestion (with optional overrides) |
//! | `jot reject <id>` | Finalize an item without its suggestion |
//! | `jot reset <id>` | Return a failed item to the pending queue |
//! | `jot serve` | Start the JSON HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! jot init --config ./config/jot.toml
//!
//! # Capture a note, optionally pinning the bucket
//! jot add "Compare noise-cancelling headphones" --bucket life
//!
//! # Classify everything pending, then review
//! jot triage
//! jot list --state awaiting_approval
//! jot approve 3f2a… --bucket work --kind task
//!
//! # Start the HTTP API
//! jot serve --config ./config/jot.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use jotbox::{capture, config, migrate, review, server};

/// Jotbox CLI — a personal note inbox with AI-assisted triage.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/jot.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "jot",
    about = "Jotbox — a personal note inbox with AI-assisted triage",
    version,
    long_about = "Jotbox captures free-text notes into a pending inbox, classifies them with a \
    configurable LLM provider (bucket, category, kind, summary, tags), and parks each suggestion \
    for explicit approval. Nothing is finalized without a human decision."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/jot.toml`. Database, triage, classifier, and
    /// server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/jot.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the items table. This command
    /// is idempotent — running it multiple times is safe.
    Init,

    /// Capture a new note into the pending inbox.
    Add {
        /// The note text.
        text: String,

        /// Pin the bucket up front (`work`, `video`, `life`, `boardgame`).
        /// The classifier will not override a pinned bucket.
        #[arg(long)]
        bucket: Option<String>,

        /// Owner scope for the item. Defaults to `[capture].owner`.
        #[arg(long)]
        owner: Option<String>,
    },

    /// List items in the inbox.
    List {
        /// Filter by triage state: `pending`, `awaiting_approval`, `done`,
        /// or `failed`.
        #[arg(long)]
        state: Option<String>,

        /// Maximum number of items to print.
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Print a full item, including its pending suggestion if any.
    Show {
        /// Item id.
        id: String,
    },

    /// Classify pending items and park the suggestions for approval.
    ///
    /// With no arguments, processes the newest pending items up to the
    /// configured batch size. With ids, processes exactly those items.
    /// Items whose classification fails are marked `failed` and can be
    /// retried with `jot reset`.
    Triage {
        /// Specific item ids to triage. When omitted, the newest pending
        /// items are selected.
        ids: Vec<String>,

        /// Override the batch size from config.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Accept a suggestion, finalizing the item as `done`.
    ///
    /// Override flags take precedence over the suggested values.
    Approve {
        /// Item id.
        id: String,

        /// Override the bucket (`work`, `video`, `life`, `boardgame`).
        #[arg(long)]
        bucket: Option<String>,

        /// Override the category (free text).
        #[arg(long)]
        category: Option<String>,

        /// Override the kind (`idea`, `task`, `note`, `reference`, `unknown`).
        #[arg(long)]
        kind: Option<String>,
    },

    /// Discard a suggestion, finalizing the item as `done` without it.
    Reject {
        /// Item id.
        id: String,
    },

    /// Return a failed item to the pending queue for another attempt.
    Reset {
        /// Item id.
        id: String,
    },

    /// Start the JSON HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// capture and triage endpoints.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env("JOTBOX_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Add {
            text,
            bucket,
            owner,
        } => {
            capture::run_add(&cfg, &text, bucket, owner).await?;
        }
        Commands::List { state, limit } => {
            review::run_list(&cfg, state, limit).await?;
        }
        Commands::Show { id } => {
            review::run_show(&cfg, &id).await?;
        }
        Commands::Triage { ids, limit } => {
            review::run_triage(&cfg, ids, limit).await?;
        }
        Commands::Approve {
            id,
            bucket,
            category,
            kind,
        } => {
            review::run_approve(&cfg, &id, bucket, category, kind).await?;
        }
        Commands::Reject { id } => {
            review::run_reject(&cfg, &id).await?;
        }
        Commands::Reset { id } => {
            review::run_reset(&cfg, &id).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
