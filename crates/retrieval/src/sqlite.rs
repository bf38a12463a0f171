//! SQLite vector store — a single embedded database file, no external
//! server dependency.
//!
//! One `vectors` table keyed by (collection, id). Embeddings are stored as
//! little-endian f32 blobs; metadata as a JSON column. Similarity is
//! computed in Rust over the collection's rows, which is plenty for the
//! per-conversation corpus sizes this engine sees.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

use assay_core::RetrievalError;

use crate::store::{rank, Filter, ScoredRecord, VectorRecord, VectorStore};

/// An embedded SQLite vector store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    /// Pass `":memory:"` for an ephemeral database (tests).
    pub async fn new(path: &str) -> Result<Self, RetrievalError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| RetrievalError::Storage(format!("invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| RetrievalError::Storage(format!("failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite vector store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), RetrievalError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vectors (
                collection TEXT NOT NULL,
                id         TEXT NOT NULL,
                text       TEXT NOT NULL,
                metadata   TEXT NOT NULL DEFAULT '{}',
                embedding  BLOB NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RetrievalError::Storage(format!("vectors table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_vectors_collection ON vectors(collection)")
            .execute(&self.pool)
            .await
            .map_err(|e| RetrievalError::Storage(format!("collection index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(embedding.len() * 4);
        for value in embedding {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<VectorRecord, RetrievalError> {
        let metadata_text: String = row.get("metadata");
        let metadata = serde_json::from_str(&metadata_text)
            .map_err(|e| RetrievalError::Storage(format!("corrupt metadata JSON: {e}")))?;
        let embedding_blob: Vec<u8> = row.get("embedding");

        Ok(VectorRecord {
            id: row.get("id"),
            embedding: Self::decode_embedding(&embedding_blob),
            text: row.get("text"),
            metadata,
        })
    }

    async fn load_collection(&self, collection: &str) -> Result<Vec<VectorRecord>, RetrievalError> {
        let rows = sqlx::query("SELECT id, text, metadata, embedding FROM vectors WHERE collection = ?")
            .bind(collection)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RetrievalError::QueryFailed(e.to_string()))?;

        rows.iter().map(Self::row_to_record).collect()
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn upsert(&self, collection: &str, record: VectorRecord) -> Result<(), RetrievalError> {
        let metadata = serde_json::to_string(&record.metadata)
            .map_err(|e| RetrievalError::Storage(format!("metadata serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO vectors (collection, id, text, metadata, embedding)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (collection, id) DO UPDATE SET
                text = excluded.text,
                metadata = excluded.metadata,
                embedding = excluded.embedding
            "#,
        )
        .bind(collection)
        .bind(&record.id)
        .bind(&record.text)
        .bind(&metadata)
        .bind(Self::encode_embedding(&record.embedding))
        .execute(&self.pool)
        .await
        .map_err(|e| RetrievalError::Storage(format!("upsert: {e}")))?;

        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        k: usize,
        filter: &Filter,
    ) -> Result<Vec<ScoredRecord>, RetrievalError> {
        let records = self.load_collection(collection).await?;
        Ok(rank(records.into_iter(), embedding, k, filter))
    }

    async fn delete_where(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<usize, RetrievalError> {
        let records = self.load_collection(collection).await?;
        let filter = Filter::equals(field, value);
        let doomed: Vec<&str> = records
            .iter()
            .filter(|r| filter.matches(&r.metadata))
            .map(|r| r.id.as_str())
            .collect();

        let mut deleted = 0usize;
        for id in doomed {
            let result = sqlx::query("DELETE FROM vectors WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| RetrievalError::Storage(format!("delete: {e}")))?;
            deleted += result.rows_affected() as usize;
        }
        Ok(deleted)
    }

    async fn count(&self, collection: &str) -> Result<usize, RetrievalError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM vectors WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RetrievalError::QueryFailed(e.to_string()))?;
        let n: i64 = row.get("n");
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, embedding: Vec<f32>, source: &str) -> VectorRecord {
        VectorRecord {
            id: id.into(),
            embedding,
            text: format!("text {id}"),
            metadata: serde_json::json!({"source_id": source, "turn": 1}),
        }
    }

    async fn memory_store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn roundtrip_upsert_query() {
        let store = memory_store().await;
        store.upsert("documents", record("a", vec![1.0, 0.0], "x.md")).await.unwrap();
        store.upsert("documents", record("b", vec![0.0, 1.0], "x.md")).await.unwrap();

        let hits = store
            .query("documents", &[1.0, 0.0], 10, &Filter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.id, "a");
        assert!((hits[0].score - 1.0).abs() < 1e-5);
        assert_eq!(hits[0].record.text, "text a");
    }

    #[tokio::test]
    async fn upsert_replaces() {
        let store = memory_store().await;
        store.upsert("documents", record("a", vec![1.0, 0.0], "x.md")).await.unwrap();
        store.upsert("documents", record("a", vec![0.0, 1.0], "y.md")).await.unwrap();
        assert_eq!(store.count("documents").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn embedding_blob_roundtrip() {
        let original = vec![0.25f32, -1.5, 3.75, 0.0];
        let decoded = SqliteStore::decode_embedding(&SqliteStore::encode_embedding(&original));
        assert_eq!(original, decoded);
    }

    #[tokio::test]
    async fn delete_where_by_source() {
        let store = memory_store().await;
        store.upsert("documents", record("a", vec![1.0], "x.md")).await.unwrap();
        store.upsert("documents", record("b", vec![1.0], "x.md")).await.unwrap();
        store.upsert("documents", record("c", vec![1.0], "y.md")).await.unwrap();

        let deleted = store.delete_where("documents", "source_id", "x.md").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.count("documents").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.db");
        let path_str = format!("sqlite://{}", path.display());

        {
            let store = SqliteStore::new(&path_str).await.unwrap();
            store.upsert("documents", record("a", vec![1.0, 2.0], "x.md")).await.unwrap();
        }

        let store = SqliteStore::new(&path_str).await.unwrap();
        assert_eq!(store.count("documents").await.unwrap(), 1);
    }
}
