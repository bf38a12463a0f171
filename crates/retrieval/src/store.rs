//! The vector store abstraction: collection-scoped upsert and
//! cosine-ranked query with metadata filters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use assay_core::RetrievalError;

/// A stored vector with its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Unique id within the collection; upserting replaces.
    pub id: String,

    /// The embedding vector.
    pub embedding: Vec<f32>,

    /// The text that was embedded (kept as payload).
    pub text: String,

    /// Arbitrary metadata object used for filtering and payload fields.
    pub metadata: serde_json::Value,
}

/// A query hit with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: VectorRecord,
    pub score: f32,
}

/// Metadata filter: equality on fields, plus an upper bound on the
/// numeric `turn` field for conversation-window queries.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub equals: Vec<(String, String)>,
    pub turn_before: Option<u32>,
}

impl Filter {
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            equals: vec![(field.into(), value.into())],
            turn_before: None,
        }
    }

    pub fn turn_before(turn: u32) -> Self {
        Self {
            equals: Vec::new(),
            turn_before: Some(turn),
        }
    }

    /// Whether a record's metadata passes this filter.
    pub fn matches(&self, metadata: &serde_json::Value) -> bool {
        for (field, expected) in &self.equals {
            let matched = match metadata.get(field) {
                Some(serde_json::Value::String(s)) => s == expected,
                Some(other) => other.to_string() == *expected,
                None => false,
            };
            if !matched {
                return false;
            }
        }
        if let Some(bound) = self.turn_before {
            let turn = metadata.get("turn").and_then(|v| v.as_u64());
            match turn {
                Some(t) => {
                    if t >= bound as u64 {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }
}

/// The vector storage boundary. Backends: in-memory (tests, ephemeral
/// sessions) and an embedded SQLite file. No external server dependency.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The backend name (e.g., "in_memory", "sqlite").
    fn name(&self) -> &str;

    /// Insert or replace a record in a collection.
    async fn upsert(&self, collection: &str, record: VectorRecord) -> Result<(), RetrievalError>;

    /// Top-k records by cosine similarity, filtered by metadata, sorted by
    /// descending score.
    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        k: usize,
        filter: &Filter,
    ) -> Result<Vec<ScoredRecord>, RetrievalError>;

    /// Delete all records whose metadata field equals the value.
    /// Returns the number deleted.
    async fn delete_where(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<usize, RetrievalError>;

    /// Number of records in a collection.
    async fn count(&self, collection: &str) -> Result<usize, RetrievalError>;
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1]. Returns 0.0 for empty or mismatched
/// vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank records against a query embedding, filter, sort descending,
/// truncate to k. Shared by store backends.
pub(crate) fn rank(
    records: impl Iterator<Item = VectorRecord>,
    embedding: &[f32],
    k: usize,
    filter: &Filter,
) -> Vec<ScoredRecord> {
    let mut scored: Vec<ScoredRecord> = records
        .filter(|r| filter.matches(&r.metadata))
        .map(|r| {
            let score = cosine_similarity(&r.embedding, embedding);
            ScoredRecord { record: r, score }
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}
