use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default Qdrant endpoint.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";
/// Default collection holding the transcript chunks.
pub const DEFAULT_COLLECTION: &str = "kb";
/// Default embedding model.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";
/// Default OpenAI API base URL.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Keys owned by `kb setup`. A merge-write replaces exactly these and
/// leaves every other entry in the file untouched.
pub const MANAGED_KEYS: [&str; 3] = ["openai_api_key", "qdrant_url", "collection"];

/// Raw contents of the config file. Every field is optional — the file may
/// be absent entirely, or hold only a subset of keys.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub qdrant_url: Option<String>,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub openai_base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Fully resolved settings handed to the command runners.
///
/// Resolution order per setting: CLI flag (applied by the caller) →
/// environment variable → config file → built-in default. The API key has
/// no default; its absence is reported before any network call.
#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub qdrant_url: String,
    pub collection: String,
    pub model: String,
    pub openai_base_url: String,
    pub timeout_secs: u64,
}

impl Settings {
    /// Resolve settings from the environment and a parsed config file.
    pub fn resolve(file: &ConfigFile) -> Self {
        Self::resolve_from(
            file,
            env_non_empty("OPENAI_API_KEY"),
            env_non_empty("QDRANT_URL"),
        )
    }

    fn resolve_from(
        file: &ConfigFile,
        env_api_key: Option<String>,
        env_qdrant_url: Option<String>,
    ) -> Self {
        Self {
            openai_api_key: env_api_key.or_else(|| file.openai_api_key.clone()),
            qdrant_url: env_qdrant_url
                .or_else(|| file.qdrant_url.clone())
                .unwrap_or_else(|| DEFAULT_QDRANT_URL.to_string()),
            collection: file
                .collection
                .clone()
                .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            model: file
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            openai_base_url: file
                .openai_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            timeout_secs: file.timeout_secs.unwrap_or(30),
        }
    }

    /// The API key, or a user-actionable error naming both sources.
    pub fn require_api_key(&self) -> Result<&str> {
        self.openai_api_key.as_deref().ok_or_else(|| {
            anyhow::anyhow!("OPENAI_API_KEY is not set. Export it or run `kb setup` to store it.")
        })
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Default config location: `~/.kb-search/config.toml`.
pub fn default_config_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".kb-search")
        .join("config.toml")
}

/// Load the config file. A missing file yields an empty config; a file
/// that exists but does not parse is an error.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ConfigFile::default()),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read config file: {}", path.display()))
        }
    };

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Write the three managed keys into the config file, preserving any
/// unrelated entries already present.
///
/// The existing file is parsed as a plain TOML table so keys this tool does
/// not own survive the rewrite (as values — formatting and comments are
/// not preserved).
pub fn save_managed(path: &Path, api_key: &str, qdrant_url: &str, collection: &str) -> Result<()> {
    let mut table = match std::fs::read_to_string(path) {
        Ok(content) => content
            .parse::<toml::Table>()
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => toml::Table::new(),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read config file: {}", path.display()))
        }
    };

    table.insert(
        "openai_api_key".to_string(),
        toml::Value::String(api_key.to_string()),
    );
    table.insert(
        "qdrant_url".to_string(),
        toml::Value::String(qdrant_url.to_string()),
    );
    table.insert(
        "collection".to_string(),
        toml::Value::String(collection.to_string()),
    );

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }

    let rendered = toml::to_string_pretty(&table).context("Failed to serialize config")?;
    std::fs::write(path, rendered)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    Ok(())
}
