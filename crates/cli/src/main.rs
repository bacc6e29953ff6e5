//! PaperChat CLI — the main entry point.
//!
//! Commands:
//! - `serve`       — Start the HTTP API server
//! - `ingest`      — Add a document to a collection
//! - `ask`         — Ask one question against a collection
//! - `sessions`    — Inspect or clear conversation history
//! - `collections` — List or delete vector collections
//! - `onboard`     — Write a default config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use paperchat_config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "paperchat",
    about = "PaperChat — chat with your documents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.paperchat/config.toml)
    #[arg(short, long, global = true, env = "PAPERCHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Split, embed and index a PDF, TXT or MD file
    Ingest {
        file: PathBuf,

        /// Target collection (defaults to the configured one)
        #[arg(short, long)]
        collection: Option<String>,
    },

    /// Ask a question about an ingested collection
    Ask {
        query: String,

        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,

        #[arg(short, long)]
        collection: Option<String>,
    },

    /// Conversation history
    #[command(subcommand)]
    Sessions(SessionsCommand),

    /// Vector collections
    #[command(subcommand)]
    Collections(CollectionsCommand),

    /// Write a default configuration file
    Onboard,
}

#[derive(Subcommand)]
enum SessionsCommand {
    /// List sessions, most recently updated first
    List,
    /// Print a session's messages
    Show { id: String },
    /// Delete a session's history
    Clear { id: String },
}

#[derive(Subcommand)]
enum CollectionsCommand {
    List,
    Delete { name: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // `onboard` must work even when an existing config is broken
    let config = match (&cli.command, &cli.config) {
        (Commands::Onboard, _) => AppConfig::default(),
        (_, Some(path)) => AppConfig::load_with_env(path)
            .map_err(|e| format!("Failed to load config: {e}"))?,
        (_, None) => AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?,
    };

    init_tracing(cli.verbose, &config);

    match cli.command {
        Commands::Onboard => commands::onboard::run(cli.config.as_deref()).await?,
        Commands::Serve { port } => commands::serve::run(config, port).await?,
        Commands::Ingest { file, collection } => {
            commands::ingest::run(&config, &file, collection.as_deref()).await?
        }
        Commands::Ask {
            query,
            session,
            collection,
        } => commands::ask::run(&config, query, session, collection).await?,
        Commands::Sessions(cmd) => match cmd {
            SessionsCommand::List => commands::sessions::list(&config).await?,
            SessionsCommand::Show { id } => commands::sessions::show(&config, &id).await?,
            SessionsCommand::Clear { id } => commands::sessions::clear(&config, &id).await?,
        },
        Commands::Collections(cmd) => match cmd {
            CollectionsCommand::List => commands::collections::list(&config).await?,
            CollectionsCommand::Delete { name } => {
                commands::collections::delete(&config, &name).await?
            }
        },
    }

    Ok(())
}

/// `RUST_LOG` wins, then `--verbose`, then `logging.level`.
fn init_tracing(verbose: bool, config: &AppConfig) {
    let fallback = if verbose {
        "debug"
    } else {
        config.logging.filter_directive()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}
