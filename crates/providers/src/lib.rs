//! # Assay Providers
//!
//! Concrete clients for the two external service boundaries: generation
//! (Anthropic Messages API) and embedding (Voyage AI). Both implement the
//! core traits, so the engine never knows which backend is configured.

pub mod anthropic;
pub mod voyage;

pub use anthropic::AnthropicProvider;
pub use voyage::VoyageEmbedder;
