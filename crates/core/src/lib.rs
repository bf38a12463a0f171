//! # Assay Core
//!
//! Domain types, traits, and error definitions for the assay conversational
//! analysis engine. This crate has **zero framework dependencies** — it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external boundary is defined as a trait here (generation,
//! embedding). Implementations live in their respective crates. This
//! enables:
//! - Swapping backends via configuration
//! - Easy testing with scripted mock implementations
//! - A clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{CommandError, Error, FactError, IngestError, ProviderError, Result, RetrievalError};
pub use event::{DomainEvent, EventBus};
pub use message::{ConversationId, Message, MessageToolCall, Role, TurnRecord};
pub use provider::{
    Embedder, EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse,
    ToolDefinition, Usage,
};
