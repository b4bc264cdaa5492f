//! Vector store client (Qdrant REST API).
//!
//! Defines the [`VectorStore`] trait and the [`QdrantStore`] implementation.
//! The store owns ranking semantics entirely — hits come back ordered by
//! similarity score and are passed through untouched.
//!
//! Scoping is expressed with [`ScopeFilter`], a single must/match equality
//! condition. An unscoped query carries no `filter` member in the request
//! body at all (not an empty filter object); Qdrant treats the two
//! differently.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Equality filter narrowing a similarity search to one field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeFilter {
    pub must: Vec<FieldCondition>,
}

impl ScopeFilter {
    /// Build a filter matching `key == value`.
    pub fn must_match(key: &str, value: &str) -> Self {
        Self {
            must: vec![FieldCondition {
                key: key.to_string(),
                match_value: MatchValue {
                    value: value.to_string(),
                },
            }],
        }
    }
}

/// One `key == value` condition inside a [`ScopeFilter`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldCondition {
    pub key: String,
    #[serde(rename = "match")]
    pub match_value: MatchValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchValue {
    pub value: String,
}

/// A single similarity hit: score plus the opaque payload stored alongside
/// the vector. The payload schema is owned by the store, not this tool.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoredPoint {
    pub score: f32,
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

/// Trait for vector stores.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Run a top-`limit` similarity query against `collection`.
    ///
    /// `filter: None` means the store receives no filter at all. Hit order
    /// is the store's ranking and must be preserved by callers.
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        limit: u64,
        filter: Option<&ScopeFilter>,
    ) -> Result<Vec<ScoredPoint>>;

    /// List collection names. Used only as a reachability probe.
    async fn list_collections(&self) -> Result<Vec<String>>;
}

/// Qdrant client over the REST API.
pub struct QdrantStore {
    client: reqwest::Client,
    url: String,
}

impl QdrantStore {
    /// Create a client for the Qdrant instance at `url`.
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Serialize)]
struct SearchBody<'a> {
    vector: &'a [f32],
    limit: u64,
    with_payload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a ScopeFilter>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct CollectionsResponse {
    result: CollectionsResult,
}

#[derive(Deserialize)]
struct CollectionsResult {
    #[serde(default)]
    collections: Vec<CollectionDescription>,
}

#[derive(Deserialize)]
struct CollectionDescription {
    name: String,
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        limit: u64,
        filter: Option<&ScopeFilter>,
    ) -> Result<Vec<ScoredPoint>> {
        let body = SearchBody {
            vector,
            limit,
            with_payload: true,
            filter,
        };

        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/search",
                self.url, collection
            ))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Qdrant unreachable at {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Qdrant error {}: {}", status, body_text);
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .context("Invalid Qdrant response: not a search payload")?;

        Ok(parsed.result)
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/collections", self.url))
            .send()
            .await
            .with_context(|| format!("Qdrant unreachable at {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Qdrant error {}: {}", status, body_text);
        }

        let parsed: CollectionsResponse = response
            .json()
            .await
            .context("Invalid Qdrant response: not a collections payload")?;

        Ok(parsed
            .result
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_wire_shape() {
        let filter = ScopeFilter::must_match("channel_slug", "testchannel");
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "must": [
                    { "key": "channel_slug", "match": { "value": "testchannel" } }
                ]
            })
        );
    }

    #[test]
    fn test_search_body_omits_absent_filter() {
        let body = SearchBody {
            vector: &[0.1, 0.2],
            limit: 5,
            with_payload: true,
            filter: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("filter").is_none(), "filter member must be absent");
        assert_eq!(json["limit"], 5);
        assert_eq!(json["with_payload"], true);
    }

    #[test]
    fn test_search_body_carries_filter_when_scoped() {
        let filter = ScopeFilter::must_match("channel_slug", "stevemagness");
        let body = SearchBody {
            vector: &[0.1],
            limit: 3,
            with_payload: true,
            filter: Some(&filter),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["filter"]["must"][0]["key"], "channel_slug");
        assert_eq!(json["filter"]["must"][0]["match"]["value"], "stevemagness");
    }

    #[test]
    fn test_scored_point_without_payload_defaults_empty() {
        let point: ScoredPoint = serde_json::from_value(serde_json::json!({
            "id": 7,
            "version": 0,
            "score": 0.42
        }))
        .unwrap();
        assert_eq!(point.score, 0.42);
        assert!(point.payload.is_empty());
    }
}
