//! # Assay Ingest
//!
//! Document conversion and hierarchical chunking: raw bytes → markdown →
//! header-based sections → size-bounded leaves → parent-child pairs ready
//! for embedding.
//!
//! The pipeline is deterministic: identical input text and thresholds
//! always produce identical chunk boundaries. Conversion failures are
//! typed and isolated per document.

pub mod chunk;
pub mod convert;
pub mod parent;
pub mod size;
pub mod split;

pub use chunk::{estimate_tokens, ChunkLimits, LeafChunk, SectionSpan};
pub use convert::{convert, DeclaredFormat};
pub use parent::build_parents;
pub use size::enforce_sizes;
pub use split::split_by_headers;

use tracing::{info, warn};

/// Full pipeline: markdown text → leaf chunks ready for embedding.
pub fn process(source_id: &str, markdown: &str, limits: &ChunkLimits) -> Vec<LeafChunk> {
    let sections = split_by_headers(markdown, source_id);
    let sections = enforce_sizes(sections, limits);
    let chunks = build_parents(sections, limits.parent_max_tokens);

    if chunks.is_empty() {
        warn!(source_id, "no chunks produced");
    } else {
        let avg: usize =
            chunks.iter().map(|c| estimate_tokens(&c.text)).sum::<usize>() / chunks.len();
        info!(source_id, chunks = chunks.len(), avg_tokens = avg, "chunked document");
    }
    chunks
}
