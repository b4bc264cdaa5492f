//! Credential setup wizard for `kb setup`.
//!
//! Collects the OpenAI API key, Qdrant URL, and collection name (from flags,
//! or interactively when attached to a terminal), validates both services,
//! and only then writes the managed keys into the config file. A validation
//! failure leaves the file untouched — even when it does not exist yet.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use crate::config;
use crate::embedding::Embedder;
use crate::store::VectorStore;

/// Values collected for setup, before validation.
#[derive(Debug, Clone)]
pub struct SetupValues {
    pub openai_api_key: String,
    pub qdrant_url: String,
    pub collection: String,
}

/// Fill in missing flags, prompting on a TTY and defaulting otherwise.
///
/// The API key has no default: omitting it off-TTY is an error.
pub fn collect_values(
    openai_api_key: Option<String>,
    qdrant_url: Option<String>,
    collection: Option<String>,
) -> Result<SetupValues> {
    let interactive = atty::is(atty::Stream::Stdin);

    let openai_api_key = match openai_api_key {
        Some(v) => v,
        None if interactive => prompt("OpenAI API key", None)?,
        None => anyhow::bail!("--openai-api-key is required when not running interactively"),
    };

    let qdrant_url = match qdrant_url {
        Some(v) => v,
        None if interactive => prompt("Qdrant URL", Some(config::DEFAULT_QDRANT_URL))?,
        None => config::DEFAULT_QDRANT_URL.to_string(),
    };

    let collection = match collection {
        Some(v) => v,
        None if interactive => prompt("Collection name", Some(config::DEFAULT_COLLECTION))?,
        None => config::DEFAULT_COLLECTION.to_string(),
    };

    Ok(SetupValues {
        openai_api_key,
        qdrant_url,
        collection,
    })
}

fn prompt(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(d) => print!("{} [{}]: ", label, d),
        None => print!("{}: ", label),
    }
    std::io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read input")?;

    let value = line.trim();
    if value.is_empty() {
        match default {
            Some(d) => Ok(d.to_string()),
            None => anyhow::bail!("{} must not be empty", label),
        }
    } else {
        Ok(value.to_string())
    }
}

/// Validate both services, then persist the managed keys.
///
/// Validation runs first against the embedding provider, then the store;
/// the config file is only written after both succeed.
pub async fn run_setup(
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    values: &SetupValues,
    config_path: &Path,
) -> Result<()> {
    embedder
        .verify()
        .await
        .context("OpenAI API key is invalid")?;

    store
        .list_collections()
        .await
        .context("Qdrant is not reachable")?;

    config::save_managed(
        config_path,
        &values.openai_api_key,
        &values.qdrant_url,
        &values.collection,
    )?;

    println!("Setup complete. Settings written to {}", config_path.display());
    Ok(())
}
