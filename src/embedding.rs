//! Embedding provider client.
//!
//! Defines the [`Embedder`] trait and the [`OpenAiEmbedder`] implementation
//! backed by the OpenAI embeddings API.
//!
//! The search path performs exactly one embedding call per query — no
//! batching, no caching, no retry. Provider failures propagate to the
//! caller unmodified; any retry policy belongs outside this client.
//!
//! # Endpoints
//!
//! | Method | Path | Used by |
//! |--------|------|---------|
//! | `POST` | `/v1/embeddings` | [`Embedder::embed`] |
//! | `GET` | `/v1/models` | [`Embedder::verify`] (check/setup probes) |

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Trait for embedding providers.
///
/// The CLI talks to the provider through this seam so diagnostics and tests
/// can substitute their own implementation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text with the given model. One API call per invocation.
    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>>;

    /// Validate the configured credentials without consuming embedding quota.
    async fn verify(&self) -> Result<()>;
}

/// Embedding client for the OpenAI API.
///
/// Requires an API key; the base URL is configurable so that diagnostics
/// and tests can point at a different endpoint.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiEmbedder {
    /// Create a client with the given base URL, key, and request timeout.
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": model,
            "input": text,
        });

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("Embedding request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .context("Invalid OpenAI response: not an embeddings payload")?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }

    async fn verify(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/v1/models", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .context("OpenAI API unreachable")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        Ok(())
    }
}
