//! The retrieval assembler — builds the context bundle for the action
//! phase.
//!
//! Two tiers: the always-on sections are cheap, deterministic, and built
//! from local state only. Retrieval sections are gated by the router's
//! `requires_retrieval` flag — a filler turn ("yes", "continue") skips
//! every vector index call, saving latency and tokens for the large share
//! of turns that carry no new information.

use std::sync::Arc;

use tracing::warn;

use assay_facts::SessionState;
use assay_knowledge::{GuidanceKind, KnowledgeIndex};
use assay_retrieval::{DocumentHit, TurnHit, VectorIndex};

use crate::prompts;
use crate::router::RoutingDecision;

/// The typed context bundle. Fixed schema per section; serialized to text
/// only at the generation-call boundary via [`ContextBundle::render`].
#[derive(Debug, Clone, Default)]
pub struct ContextBundle {
    /// Org + uploaded-document overview.
    pub project_context: String,

    /// Full assumption register.
    pub assumption_register: String,

    /// Full finding skeleton.
    pub finding_skeleton: String,

    /// Rolling summary and fired-guidance history.
    pub routing_context: String,

    /// Last N raw turns.
    pub recent_turns: String,

    /// Active guidance unit text (keyed lookup, never searched).
    pub probe_content: String,

    /// Triggered pattern texts.
    pub pattern_content: String,

    /// Deduplicated parent chunks from the documents collection.
    pub retrieved_documents: String,

    /// Older turn pairs from the conversations collection.
    pub retrieved_conversations: String,

    /// True when the short-circuit path skipped the vector index.
    pub retrieval_skipped: bool,
}

impl ContextBundle {
    /// Render the bundle to prompt text. Empty sections are omitted.
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        parts.push(format!("## Project Context\n{}", self.project_context));
        parts.push(format!("## Assumption Register\n{}", self.assumption_register));
        parts.push(format!("## Finding Skeleton\n{}", self.finding_skeleton));
        parts.push(format!("## Routing Context\n{}", self.routing_context));
        if !self.recent_turns.is_empty() {
            parts.push(format!("## Recent Exchanges\n{}", self.recent_turns));
        }
        if !self.probe_content.is_empty() {
            parts.push(format!("## Active Probe\n{}", self.probe_content));
        }
        if !self.pattern_content.is_empty() {
            parts.push(format!("## Triggered Patterns\n{}", self.pattern_content));
        }
        if !self.retrieved_documents.is_empty() {
            parts.push(format!("## Retrieved Document Context\n{}", self.retrieved_documents));
        }
        if !self.retrieved_conversations.is_empty() {
            parts.push(format!("## Earlier Relevant Exchanges\n{}", self.retrieved_conversations));
        }
        parts.join("\n\n")
    }
}

/// Builds context bundles from knowledge lookups and (conditionally) the
/// vector index.
pub struct RetrievalAssembler {
    knowledge: Arc<KnowledgeIndex>,
    index: Option<Arc<VectorIndex>>,
    recent_turns: usize,
}

impl RetrievalAssembler {
    pub fn new(
        knowledge: Arc<KnowledgeIndex>,
        index: Option<Arc<VectorIndex>>,
        recent_turns: usize,
    ) -> Self {
        Self { knowledge, index, recent_turns }
    }

    /// Assemble the bundle for one turn.
    pub async fn assemble(
        &self,
        user_message: &str,
        decision: &RoutingDecision,
        session: &SessionState,
    ) -> ContextBundle {
        let mut bundle = self.always_on(session);
        self.lookup_guidance(decision, &mut bundle);

        if !decision.requires_retrieval {
            // Short-circuit: zero vector index calls on filler turns.
            bundle.retrieval_skipped = true;
            return bundle;
        }

        let Some(index) = &self.index else {
            bundle.retrieval_skipped = true;
            return bundle;
        };

        // Augment the document query with the active probe key when one is
        // set; it sharpens retrieval toward the probe's subject.
        let doc_query = match &decision.active_probe {
            Some(probe) if !probe.is_empty() => format!("{user_message} {probe}"),
            _ => user_message.to_string(),
        };

        match index.search_documents(&doc_query).await {
            Ok(hits) => bundle.retrieved_documents = format_document_hits(&hits),
            Err(e) => {
                // Degrade to no retrieved content, never abort the turn.
                warn!(error = %e, "document retrieval failed, continuing without");
            }
        }

        match index.search_turns(user_message, session.turn_count).await {
            Ok(hits) => bundle.retrieved_conversations = format_turn_hits(&hits),
            Err(e) => {
                warn!(error = %e, "conversation retrieval failed, continuing without");
            }
        }

        bundle
    }

    /// The always-on sections: cheap, deterministic, no I/O.
    fn always_on(&self, session: &SessionState) -> ContextBundle {
        let routing = &session.routing;
        let mut routing_lines = vec![format!(
            "Rolling summary: {}",
            if routing.conversation_summary.is_empty() {
                "(none yet)"
            } else {
                routing.conversation_summary.as_str()
            }
        )];
        if !routing.probes_fired.is_empty() {
            routing_lines.push(format!("Probes fired: {:?}", routing.probe_names()));
        }
        if !routing.patterns_fired.is_empty() {
            routing_lines.push(format!("Patterns fired: {:?}", routing.pattern_names()));
        }
        if routing.micro_synthesis_due {
            routing_lines.push("Micro-synthesis is due this turn.".into());
        }

        ContextBundle {
            project_context: session.project.render(&session.org),
            assumption_register: prompts::format_assumptions(&session.register),
            finding_skeleton: prompts::format_skeleton(&session.skeleton),
            routing_context: routing_lines.join("\n"),
            recent_turns: prompts::format_messages(session.recent_messages(self.recent_turns)),
            ..Default::default()
        }
    }

    /// Keyed guidance lookups for the active probe and triggered patterns.
    fn lookup_guidance(&self, decision: &RoutingDecision, bundle: &mut ContextBundle) {
        if let Some(probe) = &decision.active_probe {
            if let Some(text) = self.knowledge.lookup_any(probe) {
                bundle.probe_content = text.to_string();
            } else if !probe.is_empty() {
                warn!(probe, "router named an unknown guidance unit");
            }
        }

        let mut pattern_parts = Vec::new();
        for key in &decision.triggered_patterns {
            if let Some(text) = self.knowledge.lookup(GuidanceKind::Pattern, key) {
                pattern_parts.push(text.to_string());
            }
        }
        bundle.pattern_content = pattern_parts.join("\n\n");
    }
}

fn format_document_hits(hits: &[DocumentHit]) -> String {
    hits.iter()
        .map(|h| format!("{}\n{}", h.context_header, h.parent_text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn format_turn_hits(hits: &[TurnHit]) -> String {
    hits.iter()
        .map(|h| {
            let probe_label = if h.record.active_probe.is_empty() {
                String::new()
            } else {
                format!(" (Probe: {})", h.record.active_probe)
            };
            format!(
                "Turn {}{}:\nUser: {}\nAssistant: {}",
                h.record.turn, probe_label, h.record.user_message, h.record.assistant_response
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
