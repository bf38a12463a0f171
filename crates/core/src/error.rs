//! Error types for the assay domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Each bounded context
//! has its own error enum; the top-level `Error` rolls them up.
//!
//! The propagation policy mirrors the engine's degradation rules: provider
//! and retrieval failures are absorbed where they occur (retry, then
//! degrade), unknown references become tool-result strings, and only
//! storage-layer unavailability is allowed to abort a turn.

use thiserror::Error;

/// The top-level error type for all assay operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Fact store error: {0}")]
    Fact(#[from] FactError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures from the generation or embedding service boundary.
///
/// Rate limits are a distinct variant so callers can drive backoff policy
/// differently from hard API errors.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Whether a retry with backoff is worthwhile.
    ///
    /// Rate limits, 5xx responses, timeouts and transport errors are
    /// transient; everything else (auth failures, other 4xx, malformed
    /// bodies) fails fast.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

/// Failures from the vector index and its storage backends.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Storage layer unavailable. The one category allowed to abort a turn.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),
}

/// Per-document conversion failures. Always isolated: one broken document
/// never affects ingestion of the others, and the caller keeps the
/// original bytes.
#[derive(Debug, Clone, Error)]
pub enum IngestError {
    #[error("Unsupported document format: {format} ({source_id})")]
    Unsupported { source_id: String, format: String },

    #[error("Document is not valid UTF-8: {source_id}")]
    InvalidEncoding { source_id: String },

    #[error("Document is empty: {source_id}")]
    EmptyDocument { source_id: String },
}

/// Fact store failures. Referencing an unknown id is reported, never a
/// panic, and never leaves partially mutated state behind.
#[derive(Debug, Clone, Error)]
pub enum FactError {
    #[error("Assumption {0} not found")]
    NotFound(String),
}

/// Tool-call dispatch failures, fed back to the model as tool results.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Invalid arguments for {name}: {reason}")]
    InvalidArguments { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn transient_classification() {
        assert!(ProviderError::RateLimited { retry_after_secs: 5 }.is_transient());
        assert!(ProviderError::ApiError { status_code: 503, message: String::new() }.is_transient());
        assert!(ProviderError::Network("reset".into()).is_transient());
        assert!(!ProviderError::ApiError { status_code: 400, message: String::new() }.is_transient());
        assert!(!ProviderError::AuthenticationFailed("bad key".into()).is_transient());
    }

    #[test]
    fn fact_not_found_displays_id() {
        let err = Error::Fact(FactError::NotFound("A7".into()));
        assert!(err.to_string().contains("A7"));
    }

    #[test]
    fn ingest_error_names_document() {
        let err = IngestError::Unsupported {
            source_id: "notes.docx".into(),
            format: "docx".into(),
        };
        assert!(err.to_string().contains("notes.docx"));
    }
}
