//! Configuration loading, validation, and management for assay.
//!
//! Loads from a TOML file with environment variable overrides for the
//! secrets, and validates all settings at load time. Every field has a
//! serde default so a partial (or missing) file still yields a working
//! configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The root configuration structure.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// Generation service settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key. Usually supplied via `ASSAY_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model for the executor (heavy) call.
    #[serde(default = "default_model")]
    pub model: String,

    /// Model for the router (light) call.
    #[serde(default = "default_router_model")]
    pub router_model: String,

    /// Model for the post-turn summary call.
    #[serde(default = "default_summary_model")]
    pub summary_model: String,

    /// Max tokens for executor responses.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Max tokens for the router decision.
    #[serde(default = "default_router_max_tokens")]
    pub router_max_tokens: u32,

    /// Timeout for executor generation calls, seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for router calls, seconds. The router budget is an order
    /// of magnitude smaller than the executor's.
    #[serde(default = "default_router_timeout")]
    pub router_timeout_secs: u64,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_router_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_summary_model() -> String {
    "claude-haiku-35-20241022".into()
}
fn default_max_tokens() -> u32 {
    8096
}
fn default_router_max_tokens() -> u32 {
    500
}
fn default_request_timeout() -> u64 {
    120
}
fn default_router_timeout() -> u64 {
    30
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            router_model: default_router_model(),
            summary_model: default_summary_model(),
            max_tokens: default_max_tokens(),
            router_max_tokens: default_router_max_tokens(),
            request_timeout_secs: default_request_timeout(),
            router_timeout_secs: default_router_timeout(),
        }
    }
}

/// Embedding service settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// API key. Usually supplied via `ASSAY_EMBEDDING_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,

    #[serde(default = "default_backoff_max")]
    pub backoff_max_secs: u64,

    #[serde(default = "default_backoff_attempts")]
    pub backoff_max_attempts: u32,
}

fn default_embedding_model() -> String {
    "voyage-3".into()
}
fn default_dimensions() -> usize {
    1024
}
fn default_batch_size() -> usize {
    128
}
fn default_max_in_flight() -> usize {
    4
}
fn default_backoff_base() -> u64 {
    2
}
fn default_backoff_max() -> u64 {
    60
}
fn default_backoff_attempts() -> u32 {
    5
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            batch_size: default_batch_size(),
            max_in_flight: default_max_in_flight(),
            backoff_base_secs: default_backoff_base(),
            backoff_max_secs: default_backoff_max(),
            backoff_max_attempts: default_backoff_attempts(),
        }
    }
}

/// Chunking thresholds, in estimated tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_min_chunk")]
    pub min_tokens: usize,

    #[serde(default = "default_max_chunk")]
    pub max_tokens: usize,

    #[serde(default = "default_parent_max")]
    pub parent_max_tokens: usize,
}

fn default_min_chunk() -> usize {
    100
}
fn default_max_chunk() -> usize {
    500
}
fn default_parent_max() -> usize {
    2000
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_tokens: default_min_chunk(),
            max_tokens: default_max_chunk(),
            parent_max_tokens: default_parent_max(),
        }
    }
}

/// Retrieval knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_doc_results")]
    pub document_results: usize,

    #[serde(default = "default_conv_results")]
    pub conversation_results: usize,

    #[serde(default = "default_window")]
    pub always_on_window: u32,
}

fn default_doc_results() -> usize {
    4
}
fn default_conv_results() -> usize {
    3
}
fn default_window() -> u32 {
    3
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            document_results: default_doc_results(),
            conversation_results: default_conv_results(),
            always_on_window: default_window(),
        }
    }
}

/// Turn engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Max tool-call loop iterations per turn.
    #[serde(default = "default_max_iterations")]
    pub max_tool_iterations: u32,

    /// Raw recent turns always included in the context bundle.
    #[serde(default = "default_recent_turns")]
    pub recent_turns: usize,

    /// Micro-synthesis cadence in turns.
    #[serde(default = "default_synthesis_cadence")]
    pub micro_synthesis_every: u32,

    /// Executor prompt budget; transcripts are truncated above this.
    #[serde(default = "default_context_budget")]
    pub context_token_budget: usize,

    /// Overall wall-clock bound for one action phase (the whole tool
    /// loop), seconds.
    #[serde(default = "default_turn_timeout")]
    pub turn_timeout_secs: u64,
}

fn default_max_iterations() -> u32 {
    8
}
fn default_recent_turns() -> usize {
    3
}
fn default_synthesis_cadence() -> u32 {
    3
}
fn default_context_budget() -> usize {
    150_000
}
fn default_turn_timeout() -> u64 {
    300
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_iterations(),
            recent_turns: default_recent_turns(),
            micro_synthesis_every: default_synthesis_cadence(),
            context_token_budget: default_context_budget(),
            turn_timeout_secs: default_turn_timeout(),
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the embedded vector database file.
    #[serde(default = "default_db_path")]
    pub vector_db_path: String,
}

fn default_db_path() -> String {
    "assay-vectors.db".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { vector_db_path: default_db_path() }
    }
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider", &self.provider)
            .field("embedding", &self.embedding)
            .field("chunking", &self.chunking)
            .field("retrieval", &self.retrieval)
            .field("engine", &self.engine)
            .field("storage", &self.storage)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("router_model", &self.router_model)
            .field("summary_model", &self.summary_model)
            .field("max_tokens", &self.max_tokens)
            .field("router_max_tokens", &self.router_max_tokens)
            .finish()
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl AppConfig {
    /// Load from a TOML file, apply env overrides, validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let mut config: AppConfig = toml::from_str(&text)?;
        config.apply_env_overrides();
        config.validate()?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Defaults plus env overrides, used when no config file exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse from a TOML string (no env, no validation). Test helper.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("ASSAY_API_KEY") {
            if !key.is_empty() {
                self.provider.api_key = Some(key);
            }
        }
        if let Ok(key) = std::env::var("ASSAY_EMBEDDING_API_KEY") {
            if !key.is_empty() {
                self.embedding.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("ASSAY_MODEL") {
            if !model.is_empty() {
                self.provider.model = model;
            }
        }
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunking.min_tokens >= self.chunking.max_tokens {
            return Err(ConfigError::Invalid(format!(
                "chunking.min_tokens ({}) must be below chunking.max_tokens ({})",
                self.chunking.min_tokens, self.chunking.max_tokens
            )));
        }
        if self.chunking.max_tokens > self.chunking.parent_max_tokens {
            return Err(ConfigError::Invalid(
                "chunking.parent_max_tokens must be at least chunking.max_tokens".into(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::Invalid("embedding.dimensions must be positive".into()));
        }
        if self.embedding.batch_size == 0 || self.embedding.batch_size > 128 {
            return Err(ConfigError::Invalid(
                "embedding.batch_size must be between 1 and 128".into(),
            ));
        }
        if self.engine.max_tool_iterations == 0 {
            return Err(ConfigError::Invalid("engine.max_tool_iterations must be positive".into()));
        }
        Ok(())
    }
}
