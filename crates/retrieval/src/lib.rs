//! # Assay Retrieval
//!
//! The vector index: batched embedding with backoff, collection-scoped
//! storage (in-memory or embedded SQLite), and the two retrieval
//! collections — document chunks (returned as deduplicated parents) and
//! conversation turns (window-filtered, chronologically presented).

pub mod embed;
pub mod in_memory;
pub mod index;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod store;

pub use embed::{BackoffPolicy, EmbeddingClient, EmbeddingOptions, MAX_BATCH_SIZE};
pub use in_memory::InMemoryStore;
pub use index::{DocumentHit, RetrievalOptions, TurnHit, VectorIndex, CONVERSATIONS, DOCUMENTS};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use store::{cosine_similarity, Filter, ScoredRecord, VectorRecord, VectorStore};
