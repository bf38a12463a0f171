//! Chunk types and the token estimate used for all sizing decisions.

use serde::{Deserialize, Serialize};

/// A span of source text produced by header splitting. Intermediate form;
/// becomes a [`LeafChunk`] once parents are assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSpan {
    /// Span content, including its own header line.
    pub text: String,

    /// Ordered ancestor section titles, e.g. `["Findings", "Segments"]`.
    pub header_path: Vec<String>,

    /// Header depth (1 = H1, 0 = pre-header content).
    pub level: u8,

    /// Positional breadcrumb for prompt injection:
    /// `[Source: file.md > Findings > Segments]`.
    pub context_header: String,
}

/// The smallest retrievable unit: a leaf span with its enclosing parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafChunk {
    pub text: String,
    pub header_path: Vec<String>,
    pub level: u8,
    pub context_header: String,

    /// Full text of the enclosing parent section.
    pub parent_text: String,

    /// Deterministic id of the parent (retrieval dedup key).
    pub parent_id: String,

    /// Position of this leaf within its parent.
    pub leaf_index: usize,
}

impl LeafChunk {
    /// The text actually embedded: breadcrumb plus content.
    pub fn embedding_text(&self) -> String {
        format!("{}\n{}", self.context_header, self.text)
    }
}

/// Size thresholds for the pipeline, in estimated tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkLimits {
    pub min_tokens: usize,
    pub max_tokens: usize,
    pub parent_max_tokens: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            min_tokens: 100,
            max_tokens: 500,
            parent_max_tokens: 2000,
        }
    }
}

/// Approximate token count: a cheap word-count heuristic, deliberately
/// not an exact tokenizer. Good enough for chunking decisions.
pub fn estimate_tokens(text: &str) -> usize {
    (text.split_whitespace().count() as f64 * 1.3) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_scales_with_words() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("one two three four"), 5); // 4 * 1.3 = 5.2
        assert_eq!(estimate_tokens(&"word ".repeat(100)), 130);
    }

    #[test]
    fn embedding_text_includes_breadcrumb() {
        let chunk = LeafChunk {
            text: "body".into(),
            header_path: vec!["Intro".into()],
            level: 1,
            context_header: "[Source: a.md > Intro]".into(),
            parent_text: "body".into(),
            parent_id: "abc".into(),
            leaf_index: 0,
        };
        let text = chunk.embedding_text();
        assert!(text.starts_with("[Source: a.md > Intro]"));
        assert!(text.ends_with("body"));
    }
}
