//! The two-collection vector index.
//!
//! `documents`: search unit is the leaf-chunk embedding; the returned unit
//! is the enclosing parent, deduplicated by parent id with the closest
//! leaf winning.
//!
//! `conversations`: search unit is the turn-summary embedding; the
//! returned unit is the full turn pair, restricted to turns older than the
//! always-on window and re-sorted chronologically for presentation.

use std::sync::Arc;

use tracing::{debug, info};

use assay_core::message::TurnRecord;
use assay_core::RetrievalError;
use assay_ingest::LeafChunk;

use crate::embed::EmbeddingClient;
use crate::store::{Filter, VectorRecord, VectorStore};

/// Collection names.
pub const DOCUMENTS: &str = "documents";
pub const CONVERSATIONS: &str = "conversations";

/// Retrieval knobs.
#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    /// Parent chunks returned per document query.
    pub document_results: usize,
    /// Turn pairs returned per conversation query.
    pub conversation_results: usize,
    /// Recent turns always present in raw form; older turns are reachable
    /// only through retrieval.
    pub always_on_window: u32,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            document_results: 4,
            conversation_results: 3,
            always_on_window: 3,
        }
    }
}

/// A deduplicated document hit: the parent section, best leaf score.
#[derive(Debug, Clone)]
pub struct DocumentHit {
    pub parent_text: String,
    pub context_header: String,
    pub source_id: String,
    pub score: f32,
}

/// A retrieved past turn.
#[derive(Debug, Clone)]
pub struct TurnHit {
    pub record: TurnRecord,
    pub score: f32,
}

/// Embed → upsert → query over the two collections.
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    embeddings: EmbeddingClient,
    options: RetrievalOptions,
}

impl VectorIndex {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embeddings: EmbeddingClient,
        options: RetrievalOptions,
    ) -> Self {
        Self { store, embeddings, options }
    }

    pub fn options(&self) -> &RetrievalOptions {
        &self.options
    }

    /// Embed and store a document's leaf chunks.
    /// Returns the number of chunks indexed.
    pub async fn ingest_document(
        &self,
        source_id: &str,
        chunks: &[LeafChunk],
    ) -> Result<usize, RetrievalError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(LeafChunk::embedding_text).collect();
        let vectors = self.embeddings.embed(&texts).await?;

        for (i, (chunk, embedding)) in chunks.iter().zip(vectors).enumerate() {
            let record = VectorRecord {
                id: format!("{source_id}::chunk{i}"),
                embedding,
                text: texts[i].clone(),
                metadata: serde_json::json!({
                    "source_id": source_id,
                    "parent_id": chunk.parent_id,
                    "parent_text": chunk.parent_text,
                    "context_header": chunk.context_header,
                    "header_path": chunk.header_path,
                    "leaf_index": chunk.leaf_index,
                }),
            };
            self.store.upsert(DOCUMENTS, record).await?;
        }

        info!(source_id, chunks = chunks.len(), "ingested document");
        Ok(chunks.len())
    }

    /// Remove every chunk of a document. Returns the number deleted.
    pub async fn remove_document(&self, source_id: &str) -> Result<usize, RetrievalError> {
        let deleted = self.store.delete_where(DOCUMENTS, "source_id", source_id).await?;
        info!(source_id, deleted, "removed document");
        Ok(deleted)
    }

    /// Index a completed turn. The summary is embedded; the full pair
    /// rides along as payload. Upsert is keyed by turn number, so re-indexing a turn
    /// replaces it.
    pub async fn index_turn(&self, record: &TurnRecord) -> Result<(), RetrievalError> {
        let embedding = self.embeddings.embed_one(&record.summary).await?;

        self.store
            .upsert(
                CONVERSATIONS,
                VectorRecord {
                    id: format!("turn_{}", record.turn),
                    embedding,
                    text: record.summary.clone(),
                    metadata: serde_json::json!({
                        "turn": record.turn,
                        "active_probe": record.active_probe,
                        "active_mode": record.active_mode,
                        "user_message": record.user_message,
                        "assistant_response": record.assistant_response,
                    }),
                },
            )
            .await?;

        debug!(turn = record.turn, "indexed turn");
        Ok(())
    }

    /// Query `documents`, deduplicating leaves to parents.
    pub async fn search_documents(&self, query: &str) -> Result<Vec<DocumentHit>, RetrievalError> {
        if self.store.count(DOCUMENTS).await? == 0 {
            return Ok(Vec::new());
        }

        let n = self.options.document_results;
        let embedding = self.embeddings.embed_one(query).await?;

        // Over-fetch so dedup by parent still fills n results.
        let hits = self
            .store
            .query(DOCUMENTS, &embedding, n * 2, &Filter::default())
            .await?;

        let mut seen_parents: Vec<String> = Vec::new();
        let mut results = Vec::new();

        for hit in hits {
            let meta = &hit.record.metadata;
            let parent_id = meta.get("parent_id").and_then(|v| v.as_str()).unwrap_or_default();
            if seen_parents.iter().any(|p| p == parent_id) {
                continue;
            }
            seen_parents.push(parent_id.to_string());
            results.push(DocumentHit {
                parent_text: meta
                    .get("parent_text")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                context_header: meta
                    .get("context_header")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                source_id: meta
                    .get("source_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                score: hit.score,
            });
            if results.len() >= n {
                break;
            }
        }

        Ok(results)
    }

    /// Query `conversations` for turns older than the always-on window,
    /// re-sorted chronologically (independent of similarity rank).
    pub async fn search_turns(
        &self,
        query: &str,
        current_turn: u32,
    ) -> Result<Vec<TurnHit>, RetrievalError> {
        let threshold = current_turn.saturating_sub(self.options.always_on_window);
        if threshold == 0 {
            return Ok(Vec::new()); // not enough history yet
        }
        if self.store.count(CONVERSATIONS).await? == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embeddings.embed_one(query).await?;
        let hits = self
            .store
            .query(
                CONVERSATIONS,
                &embedding,
                self.options.conversation_results,
                &Filter::turn_before(threshold),
            )
            .await?;

        let mut turns: Vec<TurnHit> = hits
            .into_iter()
            .map(|hit| {
                let meta = &hit.record.metadata;
                TurnHit {
                    record: TurnRecord {
                        turn: meta.get("turn").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                        summary: hit.record.text.clone(),
                        user_message: meta
                            .get("user_message")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        assistant_response: meta
                            .get("assistant_response")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        active_probe: meta
                            .get("active_probe")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        active_mode: meta
                            .get("active_mode")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                    },
                    score: hit.score,
                }
            })
            .collect();

        turns.sort_by_key(|t| t.record.turn);
        Ok(turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::{BackoffPolicy, EmbeddingOptions};
    use crate::in_memory::InMemoryStore;
    use assay_core::provider::{Embedder, EmbeddingRequest, EmbeddingResponse};
    use assay_core::ProviderError;
    use assay_ingest::{process, ChunkLimits};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Deterministic embedder: maps text to a 2-d direction based on
    /// keyword content, so similarity behaves predictably in tests.
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn name(&self) -> &str {
            "keyword"
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
            let embeddings = request
                .inputs
                .iter()
                .map(|text| {
                    let churn = text.matches("churn").count() as f32;
                    let pricing = text.matches("pricing").count() as f32;
                    vec![churn + 0.01, pricing + 0.01]
                })
                .collect();
            Ok(EmbeddingResponse { embeddings, model: request.model })
        }
    }

    fn test_index() -> VectorIndex {
        let store = Arc::new(InMemoryStore::new());
        let client = EmbeddingClient::new(
            Arc::new(KeywordEmbedder),
            EmbeddingOptions {
                model: "test".into(),
                dimensions: 2,
                batch_size: 8,
                max_in_flight: 2,
                backoff: BackoffPolicy {
                    base_delay: Duration::from_millis(1),
                    max_delay: Duration::from_millis(2),
                    max_attempts: 2,
                },
            },
        );
        VectorIndex::new(store, client, RetrievalOptions::default())
    }

    fn turn(n: u32, summary: &str) -> TurnRecord {
        TurnRecord {
            turn: n,
            summary: summary.into(),
            user_message: format!("user message {n}"),
            assistant_response: format!("assistant response {n}"),
            active_probe: String::new(),
            active_mode: String::new(),
        }
    }

    #[tokio::test]
    async fn document_search_dedupes_by_parent() {
        let index = test_index();
        let md = "# Churn\n\nchurn churn churn details one.\n\n## More churn\n\nchurn churn specifics two.\n\n# Pricing\n\npricing pricing notes.\n";
        let chunks = process("notes.md", md, &ChunkLimits::default());
        let count = index.ingest_document("notes.md", &chunks).await.unwrap();
        assert!(count >= 2);

        let hits = index.search_documents("churn").await.unwrap();
        assert!(!hits.is_empty());
        // Both churn leaves share a parent; dedup leaves one hit per parent.
        let parents: Vec<&str> = hits.iter().map(|h| h.parent_text.as_str()).collect();
        let mut unique = parents.clone();
        unique.dedup();
        assert_eq!(parents.len(), unique.len());
        // Best hit is the churn parent, and it carries the full parent text.
        assert!(hits[0].parent_text.contains("specifics two"));
        assert_eq!(hits[0].source_id, "notes.md");
    }

    #[tokio::test]
    async fn remove_document_cascades() {
        let index = test_index();
        let chunks = process("a.md", "# One\n\nchurn text.\n", &ChunkLimits::default());
        index.ingest_document("a.md", &chunks).await.unwrap();

        let removed = index.remove_document("a.md").await.unwrap();
        assert_eq!(removed, chunks.len());
        assert!(index.search_documents("churn").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn turn_search_applies_window_and_sorts_chronologically() {
        let index = test_index();
        // Turns 1..=6 indexed; current turn 7, window 3 → only turns < 4.
        for n in 1..=6 {
            let summary = if n % 2 == 0 {
                format!("churn discussion at turn {n}")
            } else {
                format!("pricing discussion at turn {n}")
            };
            index.index_turn(&turn(n, &summary)).await.unwrap();
        }

        let hits = index.search_turns("churn churn churn", 7).await.unwrap();
        assert!(!hits.is_empty());
        for hit in &hits {
            assert!(hit.record.turn < 4, "turn {} leaked through window", hit.record.turn);
        }
        // Chronological order regardless of similarity rank.
        let turns: Vec<u32> = hits.iter().map(|h| h.record.turn).collect();
        let mut sorted = turns.clone();
        sorted.sort_unstable();
        assert_eq!(turns, sorted);
        // Full pair is returned, not just the summary.
        assert!(hits[0].record.user_message.starts_with("user message"));
    }

    #[tokio::test]
    async fn turn_search_empty_before_window_fills() {
        let index = test_index();
        index.index_turn(&turn(1, "churn early")).await.unwrap();
        // current=2, window=3 → threshold 0 → nothing retrievable yet.
        assert!(index.search_turns("churn", 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_collections_return_empty() {
        let index = test_index();
        assert!(index.search_documents("churn").await.unwrap().is_empty());
        assert!(index.search_turns("churn", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reindexing_a_turn_replaces_it() {
        let index = test_index();
        index.index_turn(&turn(1, "first churn summary")).await.unwrap();
        index.index_turn(&turn(1, "revised churn summary")).await.unwrap();

        let hits = index.search_turns("churn", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.summary, "revised churn summary");
    }
}
