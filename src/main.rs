//! # KB Search CLI (`kb`)
//!
//! The `kb` binary searches a transcript knowledge base stored in Qdrant,
//! using OpenAI embeddings for the query vector.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kb search "<query>"` | Search the knowledge base |
//! | `kb check` | Verify credentials and connectivity |
//! | `kb setup` | Validate credentials and write the config file |
//! | `kb completions <shell>` | Generate shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # One-time credential setup
//! kb setup
//!
//! # Verify everything is reachable
//! kb check
//!
//! # Search across all channels
//! kb search "race day nutrition"
//!
//! # Scope to one channel, ask for three results
//! kb search "threshold pace" --channel @SteveMagness --top 3
//! ```
//!
//! Credentials resolve from the environment (`OPENAI_API_KEY`,
//! `QDRANT_URL`) first, then from the config file written by `kb setup`
//! (default `~/.kb-search/config.toml`, overridable with `--config`).

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use kb_search::config::{self, Settings};
use kb_search::embedding::OpenAiEmbedder;
use kb_search::search::{self, SearchRequest};
use kb_search::store::QdrantStore;
use kb_search::{check, setup};

/// KB Search — semantic search over a transcript knowledge base.
#[derive(Parser)]
#[command(
    name = "kb",
    about = "Semantic search over a transcript knowledge base (OpenAI embeddings + Qdrant)",
    version
)]
struct Cli {
    /// Path to the config file (TOML).
    ///
    /// Defaults to `~/.kb-search/config.toml`. Written by `kb setup`;
    /// environment variables take precedence over its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Search the knowledge base.
    ///
    /// Embeds the query, runs a top-K similarity search against the
    /// configured collection, and prints ranked snippets with source links.
    Search {
        /// The search query string.
        query: String,

        /// Number of results to return.
        #[arg(long, default_value_t = 5)]
        top: u64,

        /// Qdrant collection name (overrides config).
        #[arg(long)]
        collection: Option<String>,

        /// Qdrant URL (overrides config).
        #[arg(long)]
        qdrant_url: Option<String>,

        /// Filter by channel slug (e.g. `@SteveMagness`).
        #[arg(long)]
        channel: Option<String>,

        /// Embedding model (overrides config).
        #[arg(long)]
        model: Option<String>,
    },

    /// Verify credentials and connectivity.
    ///
    /// Runs three probes — API key presence, API key validity, Qdrant
    /// reachability — and exits non-zero when any probe fails.
    Check {
        /// Qdrant URL (overrides config).
        #[arg(long)]
        qdrant_url: Option<String>,
    },

    /// Validate credentials and write the config file.
    ///
    /// Prompts for any value not passed as a flag when run on a terminal.
    /// Nothing is written unless both services validate successfully.
    Setup {
        /// OpenAI API key to store.
        #[arg(long)]
        openai_api_key: Option<String>,

        /// Qdrant URL to store.
        #[arg(long)]
        qdrant_url: Option<String>,

        /// Collection name to store.
        #[arg(long)]
        collection: Option<String>,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
        return Ok(());
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);
    let file = config::load_config(&config_path)?;
    let mut settings = Settings::resolve(&file);

    match cli.command {
        Commands::Search {
            query,
            top,
            collection,
            qdrant_url,
            channel,
            model,
        } => {
            if let Some(collection) = collection {
                settings.collection = collection;
            }
            if let Some(url) = qdrant_url {
                settings.qdrant_url = url;
            }
            if let Some(model) = model {
                settings.model = model;
            }

            let api_key = settings.require_api_key()?.to_string();

            // One leading "@" is accepted on --channel for convenience.
            let channel_slug =
                channel.map(|c| c.strip_prefix('@').unwrap_or(c.as_str()).to_string());

            let embedder =
                OpenAiEmbedder::new(&settings.openai_base_url, &api_key, settings.timeout_secs)?;
            let store = QdrantStore::new(&settings.qdrant_url, settings.timeout_secs)?;

            let request = SearchRequest {
                query,
                collection: settings.collection,
                top_k: top,
                channel_slug,
                model: settings.model,
            };

            search::run_search(&embedder, &store, &request).await?;
        }

        Commands::Check { qdrant_url } => {
            if let Some(url) = qdrant_url {
                settings.qdrant_url = url;
            }

            let api_key_set = settings.openai_api_key.is_some();
            let embedder = OpenAiEmbedder::new(
                &settings.openai_base_url,
                settings.openai_api_key.as_deref().unwrap_or(""),
                settings.timeout_secs,
            )?;
            let store = QdrantStore::new(&settings.qdrant_url, settings.timeout_secs)?;

            check::run_check(&embedder, &store, api_key_set).await?;
        }

        Commands::Setup {
            openai_api_key,
            qdrant_url,
            collection,
        } => {
            let values = setup::collect_values(openai_api_key, qdrant_url, collection)?;

            let embedder = OpenAiEmbedder::new(
                &settings.openai_base_url,
                &values.openai_api_key,
                settings.timeout_secs,
            )?;
            let store = QdrantStore::new(&values.qdrant_url, settings.timeout_secs)?;

            setup::run_setup(&embedder, &store, &values, &config_path).await?;
        }

        Commands::Completions { .. } => unreachable!(),
    }

    Ok(())
}
