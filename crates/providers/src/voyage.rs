//! Voyage AI embedding client.
//!
//! Posts text batches to the embeddings endpoint and returns fixed-length
//! vectors in input order. Rate limits map to a distinct error variant so
//! the retrieval layer's backoff policy can tell them apart from hard
//! failures.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use assay_core::error::ProviderError;
use assay_core::provider::{Embedder, EmbeddingRequest, EmbeddingResponse};

const DEFAULT_BASE_URL: &str = "https://api.voyageai.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Voyage embeddings API client.
pub struct VoyageEmbedder {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl VoyageEmbedder {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            name: "voyage".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Use a custom base URL (testing, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Embedder for VoyageEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        let url = format!("{}/v1/embeddings", self.base_url);

        let body = serde_json::json!({
            "model": request.model,
            "input": request.inputs,
            "output_dimension": request.dimensions,
        });

        debug!(
            embedder = "voyage",
            model = %request.model,
            batch = request.inputs.len(),
            "sending embedding request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(2);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed("invalid Voyage API key".into()));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Voyage API error");
            return Err(ProviderError::ApiError { status_code: status, message: error_body });
        }

        let api_resp: VoyageResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("Voyage response: {e}")))?;

        // The API returns data entries with an index; re-assemble in input
        // order to honor the Embedder contract.
        let mut data = api_resp.data;
        data.sort_by_key(|d| d.index);

        if data.len() != request.inputs.len() {
            return Err(ProviderError::MalformedResponse(format!(
                "expected {} embeddings, got {}",
                request.inputs.len(),
                data.len()
            )));
        }

        Ok(EmbeddingResponse {
            embeddings: data.into_iter().map(|d| d.embedding).collect(),
            model: api_resp.model,
        })
    }
}

#[derive(Debug, Deserialize)]
struct VoyageResponse {
    data: Vec<VoyageEmbedding>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct VoyageEmbedding {
    index: usize,
    embedding: Vec<f32>,
}
