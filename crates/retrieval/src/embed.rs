//! Batched embedding with bounded-concurrency dispatch and exponential
//! backoff.
//!
//! Batches are capped at the upstream maximum and dispatched with a
//! max-in-flight limit to respect rate limits; `buffered` preserves input
//! order. Transient failures (rate limits, 5xx, timeouts) retry with
//! exponential backoff; other 4xx fail fast.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::warn;

use assay_core::provider::{Embedder, EmbeddingRequest};
use assay_core::{ProviderError, RetrievalError};

/// Upstream batch maximum.
pub const MAX_BATCH_SIZE: usize = 128;

/// Exponential backoff policy for transient embedding failures.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    /// Delay before the given retry (1-based attempt that just failed).
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Embedding client configuration.
#[derive(Debug, Clone)]
pub struct EmbeddingOptions {
    pub model: String,
    pub dimensions: usize,
    pub batch_size: usize,
    pub max_in_flight: usize,
    pub backoff: BackoffPolicy,
}

impl Default for EmbeddingOptions {
    fn default() -> Self {
        Self {
            model: "voyage-3".into(),
            dimensions: 1024,
            batch_size: MAX_BATCH_SIZE,
            max_in_flight: 4,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Batching, retrying front-end over an [`Embedder`].
pub struct EmbeddingClient {
    embedder: Arc<dyn Embedder>,
    options: EmbeddingOptions,
}

impl EmbeddingClient {
    pub fn new(embedder: Arc<dyn Embedder>, options: EmbeddingOptions) -> Self {
        let mut options = options;
        options.batch_size = options.batch_size.clamp(1, MAX_BATCH_SIZE);
        options.max_in_flight = options.max_in_flight.max(1);
        Self { embedder, options }
    }

    pub fn dimensions(&self) -> usize {
        self.options.dimensions
    }

    /// Embed texts, preserving input order. Concurrent batches are bounded
    /// by `max_in_flight`; each batch retries independently.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batches: Vec<Vec<String>> =
            texts.chunks(self.options.batch_size).map(|c| c.to_vec()).collect();

        let results: Vec<Vec<Vec<f32>>> = stream::iter(batches)
            .map(|batch| self.embed_batch_with_retry(batch))
            .buffered(self.options.max_in_flight)
            .try_collect()
            .await?;

        Ok(results.into_iter().flatten().collect())
    }

    /// Embed a single text (query embedding).
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let query = [text.to_string()];
        let mut vectors = self.embed(&query).await?;
        vectors
            .pop()
            .ok_or_else(|| RetrievalError::EmbeddingFailed("empty embedding response".into()))
    }

    async fn embed_batch_with_retry(&self, batch: Vec<String>) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let request = EmbeddingRequest {
                model: self.options.model.clone(),
                inputs: batch.clone(),
                dimensions: self.options.dimensions,
            };

            match self.embedder.embed(request).await {
                Ok(response) => {
                    if response.embeddings.len() != batch.len() {
                        return Err(RetrievalError::EmbeddingFailed(format!(
                            "expected {} vectors, got {}",
                            batch.len(),
                            response.embeddings.len()
                        )));
                    }
                    return Ok(response.embeddings);
                }
                Err(err) if err.is_transient() && attempt < self.options.backoff.max_attempts => {
                    let mut delay = self.options.backoff.delay_for(attempt);
                    if let ProviderError::RateLimited { retry_after_secs } = &err {
                        delay = delay.max(Duration::from_secs(*retry_after_secs));
                    }
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "embedding batch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    return Err(RetrievalError::EmbeddingFailed(format!(
                        "after {attempt} attempt(s): {err}"
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assay_core::provider::EmbeddingResponse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with a scripted error for the first `failures` calls, then
    /// returns position-encoded vectors.
    struct FlakyEmbedder {
        calls: AtomicU32,
        failures: u32,
        error: ProviderError,
    }

    impl FlakyEmbedder {
        fn new(failures: u32, error: ProviderError) -> Self {
            Self { calls: AtomicU32::new(0), failures, error }
        }
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(self.error.clone());
            }
            Ok(EmbeddingResponse {
                embeddings: request
                    .inputs
                    .iter()
                    .map(|t| vec![t.len() as f32, 1.0])
                    .collect(),
                model: request.model,
            })
        }
    }

    fn fast_options(batch_size: usize) -> EmbeddingOptions {
        EmbeddingOptions {
            model: "test-model".into(),
            dimensions: 2,
            batch_size,
            max_in_flight: 2,
            backoff: BackoffPolicy {
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(4),
                max_attempts: 5,
            },
        }
    }

    #[tokio::test]
    async fn embeds_in_order_across_batches() {
        let embedder = Arc::new(FlakyEmbedder::new(0, ProviderError::Network("n/a".into())));
        let client = EmbeddingClient::new(embedder, fast_options(2));

        let texts: Vec<String> = vec!["a".into(), "bb".into(), "ccc".into(), "dddd".into(), "eeeee".into()];
        let vectors = client.embed(&texts).await.unwrap();

        assert_eq!(vectors.len(), 5);
        for (text, vector) in texts.iter().zip(&vectors) {
            assert_eq!(vector[0], text.len() as f32);
        }
    }

    #[tokio::test]
    async fn retries_rate_limit_then_succeeds() {
        let embedder = Arc::new(FlakyEmbedder::new(
            2,
            ProviderError::RateLimited { retry_after_secs: 0 },
        ));
        let client = EmbeddingClient::new(embedder.clone(), fast_options(128));

        let vectors = client.embed(&["hello".to_string()]).await.unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_5xx_then_succeeds() {
        let embedder = Arc::new(FlakyEmbedder::new(
            1,
            ProviderError::ApiError { status_code: 503, message: "unavailable".into() },
        ));
        let client = EmbeddingClient::new(embedder, fast_options(128));
        assert!(client.embed(&["x".to_string()]).await.is_ok());
    }

    #[tokio::test]
    async fn fails_fast_on_client_error() {
        let embedder = Arc::new(FlakyEmbedder::new(
            10,
            ProviderError::ApiError { status_code: 400, message: "bad input".into() },
        ));
        let client = EmbeddingClient::new(embedder.clone(), fast_options(128));

        let err = client.embed(&["x".to_string()]).await.unwrap_err();
        assert!(matches!(err, RetrievalError::EmbeddingFailed(_)));
        // One attempt only, no retries.
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_retries_and_reports() {
        let embedder = Arc::new(FlakyEmbedder::new(
            99,
            ProviderError::RateLimited { retry_after_secs: 0 },
        ));
        let client = EmbeddingClient::new(embedder.clone(), fast_options(128));

        let err = client.embed(&["x".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("attempt"));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn backoff_delays_grow_and_cap() {
        let policy = BackoffPolicy {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            max_attempts: 5,
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(10), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn empty_input_short_circuits() {
        let embedder = Arc::new(FlakyEmbedder::new(0, ProviderError::Network("n/a".into())));
        let client = EmbeddingClient::new(embedder.clone(), fast_options(128));
        assert!(client.embed(&[]).await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }
}
