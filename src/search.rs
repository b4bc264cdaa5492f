//! Query resolver and result rendering.
//!
//! [`search_chunks`] is the core search path shared by the CLI: embed the
//! query, build the optional channel filter, run one similarity query, and
//! reshape the hits. It performs exactly one embedding call and one store
//! call per invocation, never re-ranks or deduplicates, and propagates
//! collaborator errors unmodified. [`run_search`] wraps it with terminal
//! output.

use anyhow::Result;

use crate::embedding::Embedder;
use crate::store::{ScopeFilter, VectorStore};

/// Payload field used for channel scoping.
pub const CHANNEL_FIELD: &str = "channel_slug";

/// Display length for result snippets, in characters.
pub const SNIPPET_CHARS: usize = 200;

/// One resolved search invocation. The channel slug, when present, is
/// already normalized by the caller (leading `@` stripped).
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub collection: String,
    pub top_k: u64,
    pub channel_slug: Option<String>,
    pub model: String,
}

/// A ranked result: similarity score plus the hit's opaque payload,
/// both exactly as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub score: f32,
    pub payload: serde_json::Map<String, serde_json::Value>,
}

/// Search the knowledge base for relevant chunks.
///
/// 1. Embeds the query with the requested model (one call).
/// 2. Builds an equality filter on [`CHANNEL_FIELD`] when a channel slug is
///    present; an unscoped request passes no filter at all.
/// 3. Runs one top-K similarity query against the collection.
/// 4. Maps each hit to a [`SearchHit`], preserving score, payload, and the
///    store's ranking order.
///
/// Zero hits is a successful empty result, not an error. Empty queries and
/// non-positive limits are passed through; whatever error the provider or
/// store raises for them is the caller's to surface.
pub async fn search_chunks(
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    request: &SearchRequest,
) -> Result<Vec<SearchHit>> {
    let vector = embedder.embed(&request.query, &request.model).await?;

    let filter = request
        .channel_slug
        .as_deref()
        .map(|slug| ScopeFilter::must_match(CHANNEL_FIELD, slug));

    let hits = store
        .query(&request.collection, &vector, request.top_k, filter.as_ref())
        .await?;

    Ok(hits
        .into_iter()
        .map(|point| SearchHit {
            score: point.score,
            payload: point.payload,
        })
        .collect())
}

/// CLI entry point — calls [`search_chunks`] and prints results to stdout.
pub async fn run_search(
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    request: &SearchRequest,
) -> Result<()> {
    println!("Searching: \"{}\"", request.query);
    println!();

    let hits = search_chunks(embedder, store, request).await?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let title = payload_str(hit, "title", "?");
        let source = payload_str(hit, "transcript_source", "?");
        let text = payload_str(hit, "text", "");
        let url = payload_str(hit, "timestamp_url", "");

        println!("#{} [{:.2}] \"{}\"  ({})", i + 1, hit.score, title, source);
        println!("   {}", snippet(text, SNIPPET_CHARS));
        println!("   {}", url);
        println!();
    }

    Ok(())
}

fn payload_str<'a>(hit: &'a SearchHit, key: &str, default: &'a str) -> &'a str {
    hit.payload
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or(default)
}

/// Truncate `text` to at most `max_chars` characters for display, trimming
/// surrounding whitespace and appending `...` when anything was cut off.
pub fn snippet(text: &str, max_chars: usize) -> String {
    let truncated: String = text.chars().take(max_chars).collect();
    let mut out = truncated.trim().to_string();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ScoredPoint;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    // ============ Test doubles ============

    struct RecordingEmbedder {
        calls: Mutex<Vec<(String, String)>>,
    }

    impl RecordingEmbedder {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Embedder for RecordingEmbedder {
        async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>> {
            self.calls
                .lock()
                .unwrap()
                .push((text.to_string(), model.to_string()));
            Ok(vec![0.1; 1536])
        }

        async fn verify(&self) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct RecordedQuery {
        collection: String,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<ScopeFilter>,
    }

    struct RecordingStore {
        hits: Vec<ScoredPoint>,
        queries: Mutex<Vec<RecordedQuery>>,
    }

    impl RecordingStore {
        fn with_hits(hits: Vec<ScoredPoint>) -> Self {
            Self {
                hits,
                queries: Mutex::new(Vec::new()),
            }
        }

        fn queries(&self) -> Vec<RecordedQuery> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VectorStore for RecordingStore {
        async fn query(
            &self,
            collection: &str,
            vector: &[f32],
            limit: u64,
            filter: Option<&ScopeFilter>,
        ) -> Result<Vec<ScoredPoint>> {
            self.queries.lock().unwrap().push(RecordedQuery {
                collection: collection.to_string(),
                vector: vector.to_vec(),
                limit,
                filter: filter.cloned(),
            });
            Ok(self.hits.clone())
        }

        async fn list_collections(&self) -> Result<Vec<String>> {
            Ok(vec!["kb".to_string()])
        }
    }

    fn sample_payload() -> serde_json::Map<String, serde_json::Value> {
        json!({
            "video_id": "abc123",
            "title": "Test Video",
            "channel_name": "Test Channel",
            "channel_slug": "testchannel",
            "upload_date": "20240101",
            "timestamp_url": "https://youtube.com/watch?v=abc123&t=0s",
            "transcript_source": "caption",
            "source_type": "youtube",
            "chunk_index": 0,
            "total_chunks": 5,
            "text": "Athletes who perform under pressure consistently focus on process.",
        })
        .as_object()
        .unwrap()
        .clone()
    }

    fn make_hit(score: f32) -> ScoredPoint {
        ScoredPoint {
            score,
            payload: sample_payload(),
        }
    }

    fn request(channel_slug: Option<&str>) -> SearchRequest {
        SearchRequest {
            query: "test query".to_string(),
            collection: "kb".to_string(),
            top_k: 5,
            channel_slug: channel_slug.map(|s| s.to_string()),
            model: "text-embedding-3-small".to_string(),
        }
    }

    // ============ search_chunks ============

    #[tokio::test]
    async fn test_returns_score_and_payload() {
        let embedder = RecordingEmbedder::new();
        let store = RecordingStore::with_hits(vec![make_hit(0.87)]);

        let hits = search_chunks(&embedder, &store, &request(None)).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert!((hits[0].score - 0.87).abs() < f32::EPSILON);
        assert_eq!(hits[0].payload, sample_payload());
    }

    #[tokio::test]
    async fn test_embeds_query_with_model_exactly_once() {
        let embedder = RecordingEmbedder::new();
        let store = RecordingStore::with_hits(vec![make_hit(0.9)]);

        search_chunks(&embedder, &store, &request(None)).await.unwrap();

        let calls = embedder.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "test query");
        assert_eq!(calls[0].1, "text-embedding-3-small");
    }

    #[tokio::test]
    async fn test_model_override_is_used() {
        let embedder = RecordingEmbedder::new();
        let store = RecordingStore::with_hits(Vec::new());

        let mut req = request(None);
        req.model = "text-embedding-3-large".to_string();
        search_chunks(&embedder, &store, &req).await.unwrap();

        assert_eq!(embedder.calls()[0].1, "text-embedding-3-large");
    }

    #[tokio::test]
    async fn test_top_k_passed_through_as_limit() {
        let embedder = RecordingEmbedder::new();
        let store = RecordingStore::with_hits(Vec::new());

        let mut req = request(None);
        req.top_k = 7;
        search_chunks(&embedder, &store, &req).await.unwrap();

        assert_eq!(store.queries()[0].limit, 7);
    }

    #[tokio::test]
    async fn test_collection_passed_through() {
        let embedder = RecordingEmbedder::new();
        let store = RecordingStore::with_hits(Vec::new());

        let mut req = request(None);
        req.collection = "my_collection".to_string();
        search_chunks(&embedder, &store, &req).await.unwrap();

        assert_eq!(store.queries()[0].collection, "my_collection");
    }

    #[tokio::test]
    async fn test_query_vector_comes_from_embedder() {
        let embedder = RecordingEmbedder::new();
        let store = RecordingStore::with_hits(Vec::new());

        search_chunks(&embedder, &store, &request(None)).await.unwrap();

        assert_eq!(store.queries()[0].vector, vec![0.1; 1536]);
    }

    #[tokio::test]
    async fn test_no_channel_passes_no_filter() {
        let embedder = RecordingEmbedder::new();
        let store = RecordingStore::with_hits(Vec::new());

        search_chunks(&embedder, &store, &request(None)).await.unwrap();

        // Absence, not an empty filter object.
        assert_eq!(store.queries()[0].filter, None);
    }

    #[tokio::test]
    async fn test_channel_builds_equality_filter() {
        let embedder = RecordingEmbedder::new();
        let store = RecordingStore::with_hits(Vec::new());

        search_chunks(&embedder, &store, &request(Some("testchannel")))
            .await
            .unwrap();

        let queries = store.queries();
        assert_eq!(
            queries[0].filter,
            Some(ScopeFilter::must_match(CHANNEL_FIELD, "testchannel"))
        );
    }

    #[tokio::test]
    async fn test_order_preserved() {
        let embedder = RecordingEmbedder::new();
        let store =
            RecordingStore::with_hits(vec![make_hit(0.9), make_hit(0.8), make_hit(0.7)]);

        let hits = search_chunks(&embedder, &store, &request(None)).await.unwrap();

        assert_eq!(hits.len(), 3);
        let scores: Vec<f32> = hits.iter().map(|h| h.score).collect();
        assert_eq!(scores, vec![0.9, 0.8, 0.7]);
    }

    #[tokio::test]
    async fn test_payload_fields_preserved() {
        let embedder = RecordingEmbedder::new();
        let store = RecordingStore::with_hits(vec![make_hit(0.5)]);

        let hits = search_chunks(&embedder, &store, &request(None)).await.unwrap();

        let payload = &hits[0].payload;
        assert_eq!(payload["video_id"], "abc123");
        assert_eq!(
            payload["text"],
            "Athletes who perform under pressure consistently focus on process."
        );
        assert_eq!(
            payload["timestamp_url"],
            "https://youtube.com/watch?v=abc123&t=0s"
        );
    }

    #[tokio::test]
    async fn test_empty_hits_yield_empty_list() {
        let embedder = RecordingEmbedder::new();
        let store = RecordingStore::with_hits(Vec::new());

        let hits = search_chunks(&embedder, &store, &request(None)).await.unwrap();

        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_embedder_error_propagates() {
        struct FailingEmbedder;

        #[async_trait]
        impl Embedder for FailingEmbedder {
            async fn embed(&self, _text: &str, _model: &str) -> Result<Vec<f32>> {
                anyhow::bail!("quota exhausted")
            }
            async fn verify(&self) -> Result<()> {
                Ok(())
            }
        }

        let store = RecordingStore::with_hits(vec![make_hit(0.9)]);
        let err = search_chunks(&FailingEmbedder, &store, &request(None))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("quota exhausted"));
        // The store must not be called when embedding fails.
        assert!(store.queries().is_empty());
    }

    // ============ snippet ============

    #[test]
    fn test_snippet_short_text_unchanged() {
        assert_eq!(snippet("short text", 200), "short text");
    }

    #[test]
    fn test_snippet_exact_length_no_ellipsis() {
        let text = "a".repeat(200);
        assert_eq!(snippet(&text, 200), text);
    }

    #[test]
    fn test_snippet_truncates_with_ellipsis() {
        let text = "a".repeat(201);
        let out = snippet(&text, 200);
        assert_eq!(out.chars().count(), 203);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_snippet_trims_before_ellipsis() {
        let mut text = "word ".repeat(40);
        text.push_str("tail beyond the limit");
        let out = snippet(&text, 200);
        assert!(!out.starts_with(' '));
        assert!(!out.trim_end_matches("...").ends_with(' '));
    }

    #[test]
    fn test_snippet_counts_characters_not_bytes() {
        let text = "ř".repeat(250);
        let out = snippet(&text, 200);
        assert_eq!(out.chars().count(), 203);
        assert!(out.ends_with("..."));
    }
}
