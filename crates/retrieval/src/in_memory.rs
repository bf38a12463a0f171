//! In-memory vector store — tests and ephemeral sessions.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use assay_core::RetrievalError;

use crate::store::{rank, Filter, ScoredRecord, VectorRecord, VectorStore};

/// A vector store backed by per-collection `Vec`s.
#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Vec<VectorRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn upsert(&self, collection: &str, record: VectorRecord) -> Result<(), RetrievalError> {
        let mut collections = self.collections.write().await;
        let records = collections.entry(collection.to_string()).or_default();
        records.retain(|r| r.id != record.id);
        records.push(record);
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        k: usize,
        filter: &Filter,
    ) -> Result<Vec<ScoredRecord>, RetrievalError> {
        let collections = self.collections.read().await;
        let records = collections.get(collection).cloned().unwrap_or_default();
        Ok(rank(records.into_iter(), embedding, k, filter))
    }

    async fn delete_where(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<usize, RetrievalError> {
        let mut collections = self.collections.write().await;
        let Some(records) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let filter = Filter::equals(field, value);
        let before = records.len();
        records.retain(|r| !filter.matches(&r.metadata));
        Ok(before - records.len())
    }

    async fn count(&self, collection: &str) -> Result<usize, RetrievalError> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map_or(0, Vec::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, embedding: Vec<f32>, source: &str) -> VectorRecord {
        VectorRecord {
            id: id.into(),
            embedding,
            text: format!("text for {id}"),
            metadata: serde_json::json!({"source_id": source}),
        }
    }

    #[tokio::test]
    async fn upsert_and_count() {
        let store = InMemoryStore::new();
        store.upsert("documents", record("a", vec![1.0, 0.0], "x.md")).await.unwrap();
        store.upsert("documents", record("b", vec![0.0, 1.0], "x.md")).await.unwrap();
        assert_eq!(store.count("documents").await.unwrap(), 2);
        assert_eq!(store.count("conversations").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn upsert_replaces_same_id() {
        let store = InMemoryStore::new();
        store.upsert("documents", record("a", vec![1.0, 0.0], "x.md")).await.unwrap();
        store.upsert("documents", record("a", vec![0.0, 1.0], "y.md")).await.unwrap();
        assert_eq!(store.count("documents").await.unwrap(), 1);

        let hits = store
            .query("documents", &[0.0, 1.0], 1, &Filter::default())
            .await
            .unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn query_respects_filter() {
        let store = InMemoryStore::new();
        store.upsert("documents", record("a", vec![1.0, 0.0], "x.md")).await.unwrap();
        store.upsert("documents", record("b", vec![1.0, 0.0], "y.md")).await.unwrap();

        let hits = store
            .query("documents", &[1.0, 0.0], 10, &Filter::equals("source_id", "y.md"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.id, "b");
    }

    #[tokio::test]
    async fn delete_where_cascades_by_source() {
        let store = InMemoryStore::new();
        store.upsert("documents", record("a", vec![1.0], "x.md")).await.unwrap();
        store.upsert("documents", record("b", vec![1.0], "x.md")).await.unwrap();
        store.upsert("documents", record("c", vec![1.0], "y.md")).await.unwrap();

        let deleted = store.delete_where("documents", "source_id", "x.md").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.count("documents").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = InMemoryStore::new();
        store.upsert("documents", record("a", vec![1.0], "x.md")).await.unwrap();
        store.upsert("conversations", record("a", vec![1.0], "x.md")).await.unwrap();

        store.delete_where("documents", "source_id", "x.md").await.unwrap();
        assert_eq!(store.count("conversations").await.unwrap(), 1);
    }
}
