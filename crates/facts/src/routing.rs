//! Per-conversation routing context.
//!
//! The rolling summary is the single continuity channel into the next
//! routing call: if it is not replaced each turn, routing quality degrades.
//! The orchestrator repairs a missing update with a synthesized fallback.

use serde::{Deserialize, Serialize};

/// A guidance unit (probe or pattern) that fired, with its outcome note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuidanceFired {
    pub name: String,
    #[serde(default)]
    pub note: String,
    pub turn: u32,
}

/// Routing metadata carried between turns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingContext {
    /// Rolling natural-language summary, fully replaced each turn.
    pub conversation_summary: String,

    /// Probes executed so far, in firing order.
    pub probes_fired: Vec<GuidanceFired>,

    /// Patterns triggered so far, in firing order.
    pub patterns_fired: Vec<GuidanceFired>,

    /// Cadence flag: a micro-synthesis is due every third turn.
    pub micro_synthesis_due: bool,

    /// Set once the router judges enough signal has accumulated.
    pub critical_mass_reached: bool,

    /// Turns since the current mode was entered.
    pub mode_turn_count: u32,

    /// Retrieval-required flag from the most recent routing decision.
    pub last_requires_retrieval: bool,

    /// Key of the currently active guidance unit (empty if none).
    pub active_probe: String,
}

impl RoutingContext {
    pub fn record_probe(&mut self, name: impl Into<String>, note: impl Into<String>, turn: u32) {
        self.probes_fired.push(GuidanceFired {
            name: name.into(),
            note: note.into(),
            turn,
        });
    }

    pub fn record_pattern(&mut self, name: impl Into<String>, note: impl Into<String>, turn: u32) {
        self.patterns_fired.push(GuidanceFired {
            name: name.into(),
            note: note.into(),
            turn,
        });
    }

    pub fn probe_names(&self) -> Vec<&str> {
        self.probes_fired.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn pattern_names(&self) -> Vec<&str> {
        self.patterns_fired.iter().map(|p| p.name.as_str()).collect()
    }
}

/// Organizational context, enriched progressively.
///
/// Public and internal context only ever append; enrichment is capped so a
/// drifting conversation cannot grow this without bound.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrgContext {
    pub company: Option<String>,
    pub public_context: String,
    pub internal_context: String,
    pub last_enriched_domain: String,
    pub enrichment_count: u32,
}

impl OrgContext {
    /// Enrichment applications allowed per conversation.
    pub const ENRICHMENT_CAP: u32 = 3;

    pub fn is_empty(&self) -> bool {
        self.company.is_none() && self.public_context.is_empty() && self.internal_context.is_empty()
    }

    /// Apply an enrichment. Returns false (and changes nothing) once the
    /// cap is reached.
    pub fn enrich(
        &mut self,
        company: Option<String>,
        domain: Option<String>,
        public_context: Option<String>,
        internal_context: Option<String>,
    ) -> bool {
        if self.enrichment_count >= Self::ENRICHMENT_CAP {
            return false;
        }
        if let Some(c) = company {
            self.company = Some(c);
        }
        if let Some(d) = domain {
            self.last_enriched_domain = d;
        }
        if let Some(p) = public_context {
            append_section(&mut self.public_context, &p);
        }
        if let Some(i) = internal_context {
            append_section(&mut self.internal_context, &i);
        }
        self.enrichment_count += 1;
        true
    }

    /// Render for prompt injection.
    pub fn render(&self) -> String {
        if self.is_empty() {
            return "(No organizational context yet.)".into();
        }
        let mut parts = Vec::new();
        if let Some(company) = &self.company {
            parts.push(format!("## Organization: {company}"));
        }
        if !self.public_context.is_empty() {
            parts.push(format!("## Public Context\n{}", self.public_context));
        }
        if !self.internal_context.is_empty() {
            parts.push(format!("## Internal Context (user-provided)\n{}", self.internal_context));
        }
        parts.join("\n\n")
    }
}

fn append_section(target: &mut String, addition: &str) {
    if target.is_empty() {
        target.push_str(addition);
    } else {
        target.push_str("\n\n");
        target.push_str(addition);
    }
}
