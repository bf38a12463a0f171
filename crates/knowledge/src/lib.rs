//! # Assay Knowledge
//!
//! Static, keyed lookup of guidance units — diagnostic probes and domain
//! patterns. The catalog is small, enumerable, and known by name, so this
//! is a plain map loaded once at process start: when the identity of what
//! you need is already determined by a routing decision upstream, it is
//! never re-discovered via embedding search.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// The two kinds of guidance unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuidanceKind {
    /// A diagnostic line of questioning, driven by the router
    Probe,
    /// A recurring failure shape with trigger conditions
    Pattern,
}

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Failed to parse guidance document: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize)]
struct GuidanceDoc {
    #[serde(default)]
    probes: HashMap<String, String>,
    #[serde(default)]
    patterns: HashMap<String, String>,
}

/// The guidance index. Immutable after load; `lookup` is O(1) with no I/O.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeIndex {
    probes: HashMap<String, String>,
    patterns: HashMap<String, String>,
}

impl KnowledgeIndex {
    /// The built-in guidance catalog compiled into the binary.
    pub fn builtin() -> Self {
        // The embedded document is validated by tests; a parse failure here
        // would be a build defect, so fall back to an empty index rather
        // than propagate.
        Self::from_toml_str(include_str!("../guidance.toml")).unwrap_or_default()
    }

    /// Parse an index from a TOML document with `[probes]` and
    /// `[patterns]` tables of `key = "text"` entries.
    pub fn from_toml_str(text: &str) -> Result<Self, KnowledgeError> {
        let doc: GuidanceDoc = toml::from_str(text)?;
        let index = Self {
            probes: doc.probes.into_iter().map(|(k, v)| (k, v.trim().to_string())).collect(),
            patterns: doc.patterns.into_iter().map(|(k, v)| (k, v.trim().to_string())).collect(),
        };
        info!(
            probes = index.probes.len(),
            patterns = index.patterns.len(),
            "guidance index loaded"
        );
        Ok(index)
    }

    /// Overlay another document on top of this index. Matching keys are
    /// replaced; new keys are added.
    pub fn with_overrides(mut self, text: &str) -> Result<Self, KnowledgeError> {
        let doc: GuidanceDoc = toml::from_str(text)?;
        for (k, v) in doc.probes {
            self.probes.insert(k, v.trim().to_string());
        }
        for (k, v) in doc.patterns {
            self.patterns.insert(k, v.trim().to_string());
        }
        Ok(self)
    }

    /// Look up a guidance unit by kind and key.
    pub fn lookup(&self, kind: GuidanceKind, key: &str) -> Option<&str> {
        let map = match kind {
            GuidanceKind::Probe => &self.probes,
            GuidanceKind::Pattern => &self.patterns,
        };
        map.get(key).map(String::as_str)
    }

    /// Look up a probe by key, falling back to the pattern table. Routing
    /// decisions occasionally name a pattern as the active unit.
    pub fn lookup_any(&self, key: &str) -> Option<&str> {
        self.lookup(GuidanceKind::Probe, key)
            .or_else(|| self.lookup(GuidanceKind::Pattern, key))
    }

    /// All keys of a kind, sorted for deterministic prompt rendering.
    pub fn keys(&self, kind: GuidanceKind) -> Vec<&str> {
        let map = match kind {
            GuidanceKind::Probe => &self.probes,
            GuidanceKind::Pattern => &self.patterns,
        };
        let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self, kind: GuidanceKind) -> usize {
        match kind {
            GuidanceKind::Probe => self.probes.len(),
            GuidanceKind::Pattern => self.patterns.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty() && self.patterns.is_empty()
    }
}
