//! The orchestrator — sequences Router → Assembler → Executor and owns
//! the post-turn bookkeeping for each incoming message.
//!
//! Processing within a conversation is strictly sequential; the session
//! is passed by mutable reference (single writer). Errors from routing,
//! retrieval, and generation are absorbed here per the degradation
//! policy; only storage failures during explicit ingestion surface to the
//! caller.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use assay_config::AppConfig;
use assay_core::event::{DomainEvent, EventBus};
use assay_core::message::{Message, TurnRecord};
use assay_core::provider::{Provider, ProviderRequest};
use assay_core::{Error, IngestError};
use assay_facts::{FileSummary, SessionState, Status};
use assay_ingest::{ChunkLimits, DeclaredFormat};
use assay_knowledge::KnowledgeIndex;
use assay_retrieval::VectorIndex;

use crate::assembler::RetrievalAssembler;
use crate::executor::{ExecutorOptions, TurnExecutor};
use crate::prompts;
use crate::router::{self, TurnRouter};

/// Canned first-turn priming message, emitted without any provider call.
pub const PRIMING_MESSAGE: &str = "\
New project started. Before we dig into a specific problem, give me the lay of the land.\n\n\
Tell me about the team and context for this project:\n\
- Who's the team? What does everyone do?\n\
- Key stakeholders and decision-makers?\n\
- Systems, tools, or data sources they work with?\n\
- Any terminology I should know?\n\
- Current objectives or priorities?\n\
- Known challenges or political dynamics?\n\n\
The more context I have upfront, the sharper my diagnostic questions will be. \
Or if you'd rather jump straight to the problem, go ahead and we can fill in context as we go.";

/// Per-conversation turn driver.
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    knowledge: Arc<KnowledgeIndex>,
    router: TurnRouter,
    assembler: RetrievalAssembler,
    executor: TurnExecutor,
    index: Option<Arc<VectorIndex>>,
    chunk_limits: ChunkLimits,
    summary_model: String,
    micro_synthesis_every: u32,
    always_on_window: u32,
    turn_timeout: Duration,
    events: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        knowledge: Arc<KnowledgeIndex>,
        index: Option<Arc<VectorIndex>>,
        config: &AppConfig,
        events: Arc<EventBus>,
    ) -> Self {
        let router = TurnRouter::new(
            provider.clone(),
            &config.provider.router_model,
            config.provider.router_max_tokens,
            Duration::from_secs(config.provider.router_timeout_secs),
        );
        let assembler =
            RetrievalAssembler::new(knowledge.clone(), index.clone(), config.engine.recent_turns);
        let executor = TurnExecutor::new(
            provider.clone(),
            ExecutorOptions {
                model: config.provider.model.clone(),
                max_tokens: config.provider.max_tokens,
                max_iterations: config.engine.max_tool_iterations,
                context_token_budget: config.engine.context_token_budget,
            },
            events.clone(),
        );

        Self {
            provider,
            knowledge,
            router,
            assembler,
            executor,
            index,
            chunk_limits: ChunkLimits {
                min_tokens: config.chunking.min_tokens,
                max_tokens: config.chunking.max_tokens,
                parent_max_tokens: config.chunking.parent_max_tokens,
            },
            summary_model: config.provider.summary_model.clone(),
            micro_synthesis_every: config.engine.micro_synthesis_every.max(1),
            always_on_window: config.retrieval.always_on_window,
            turn_timeout: Duration::from_secs(config.engine.turn_timeout_secs),
            events,
        }
    }

    /// Emit the priming message as the first assistant turn. No provider
    /// calls, no routing.
    pub fn run_priming_turn(&self, session: &mut SessionState) -> String {
        session.turn_count += 1;
        session.push_assistant(PRIMING_MESSAGE);
        PRIMING_MESSAGE.to_string()
    }

    /// Process one user message through the full turn pipeline.
    ///
    /// This never fails: every component degrades per policy and the user
    /// always receives a response. Mutations applied before a mid-turn
    /// failure are kept.
    pub async fn run_turn(&self, session: &mut SessionState, user_message: &str) -> String {
        session.turn_count += 1;
        let turn = session.turn_count;
        info!(conversation = %session.id, turn, "turn start");

        session.push_user(user_message);

        // --- Decision phase ---
        let decision = self.router.route(session, &self.knowledge).await;
        router::apply_transition(session, &decision);
        self.events.publish(DomainEvent::TurnRouted {
            conversation_id: session.id.to_string(),
            next_action: format!("{:?}", decision.next_action),
            requires_retrieval: decision.requires_retrieval,
            timestamp: Utc::now(),
        });

        // --- Context assembly ---
        let bundle = self.assembler.assemble(user_message, &decision, session).await;
        if bundle.retrieval_skipped {
            debug!("retrieval bypassed for this turn");
        }

        // --- Action phase ---
        let execute = self.executor.execute(&decision, &bundle, session);
        let outcome = match tokio::time::timeout(self.turn_timeout, execute).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(timeout_secs = self.turn_timeout.as_secs(), "action phase timed out");
                // Tool calls already applied stay applied; no rollback
                // exists by design since each command is idempotent-safe.
                crate::executor::TurnOutcome {
                    response_text: "This is taking longer than expected. I hit a temporary issue, \
                                    but everything you've told me so far is preserved. Please try \
                                    sending your message again."
                        .into(),
                    commands_applied: 0,
                    summary_updated: false,
                    mode_completed: false,
                }
            }
        };

        session.push_assistant(&outcome.response_text);

        // --- Post-turn bookkeeping ---
        self.post_turn(session, user_message, &outcome.response_text, outcome.summary_updated)
            .await;

        self.events.publish(DomainEvent::TurnCompleted {
            conversation_id: session.id.to_string(),
            turn,
            timestamp: Utc::now(),
        });

        outcome.response_text
    }

    /// Ingest a document at the external boundary: convert, chunk, embed,
    /// index, and record a file summary for the always-on context.
    ///
    /// Conversion failures are typed and isolated; the caller keeps the
    /// original bytes and other documents are unaffected.
    pub async fn ingest_document(
        &self,
        session: &mut SessionState,
        source_id: &str,
        bytes: &[u8],
        format: DeclaredFormat,
        summary: &str,
    ) -> Result<usize, Error> {
        let index = self.index.as_ref().ok_or_else(|| Error::Config {
            message: "no vector index configured; document ingestion is unavailable".into(),
        })?;

        let markdown = assay_ingest::convert(source_id, bytes, format)?;
        let chunks = assay_ingest::process(source_id, &markdown, &self.chunk_limits);
        if chunks.is_empty() {
            return Err(IngestError::EmptyDocument { source_id: source_id.to_string() }.into());
        }

        let count = index.ingest_document(source_id, &chunks).await?;

        session.project.file_summaries.retain(|f| f.filename != source_id);
        session.project.file_summaries.push(FileSummary {
            filename: source_id.to_string(),
            summary: summary.to_string(),
        });

        self.events.publish(DomainEvent::DocumentIngested {
            source_id: source_id.to_string(),
            chunks: count,
            timestamp: Utc::now(),
        });

        Ok(count)
    }

    /// Remove a document and its chunks. Returns the number deleted.
    pub async fn remove_document(
        &self,
        session: &mut SessionState,
        source_id: &str,
    ) -> Result<usize, Error> {
        let index = self.index.as_ref().ok_or_else(|| Error::Config {
            message: "no vector index configured".into(),
        })?;
        let deleted = index.remove_document(source_id).await?;
        session.project.file_summaries.retain(|f| f.filename != source_id);
        Ok(deleted)
    }

    async fn post_turn(
        &self,
        session: &mut SessionState,
        user_message: &str,
        response: &str,
        summary_updated: bool,
    ) {
        // Micro-synthesis cadence for the next routing call.
        session.routing.micro_synthesis_due =
            session.turn_count % self.micro_synthesis_every == 0;

        if session.active_mode().is_some() {
            session.routing.mode_turn_count += 1;
        }

        // Summary-gap repair: the rolling summary is next turn's routing
        // input, so a missing update is replaced by a deterministic
        // synthesis from structured state rather than left stale.
        if !summary_updated {
            warn!("executor did not update the rolling summary; synthesizing fallback");
            session.routing.conversation_summary = fallback_summary(session);
        }

        // Index the completed turn for future retrieval once past the
        // always-on window. Failures here are soft: the turn is done.
        if let Some(index) = &self.index {
            if session.turn_count > self.always_on_window {
                let summary = match self.generate_turn_summary(user_message, response).await {
                    Some(text) => text,
                    None => fallback_summary(session),
                };
                let record = TurnRecord {
                    turn: session.turn_count,
                    summary,
                    user_message: user_message.to_string(),
                    assistant_response: response.to_string(),
                    active_probe: session.routing.active_probe.clone(),
                    active_mode: session
                        .active_mode()
                        .map(|m| m.to_string())
                        .unwrap_or_default(),
                };
                if let Err(e) = index.index_turn(&record).await {
                    warn!(error = %e, turn = session.turn_count, "turn indexing failed");
                    self.events.publish(DomainEvent::ErrorOccurred {
                        context: "turn_indexing".into(),
                        error_message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                }
            }
        }
    }

    /// Secondary generation call producing the turn summary used as the
    /// embedding target. Returns None when the call fails or the output
    /// is empty, so the caller can fall back.
    async fn generate_turn_summary(&self, user_message: &str, response: &str) -> Option<String> {
        let request = ProviderRequest::bare(
            &self.summary_model,
            vec![Message::user(prompts::turn_summary_prompt(user_message, response))],
            100,
        );

        let result =
            tokio::time::timeout(Duration::from_secs(30), self.provider.complete(request)).await;

        match result {
            Ok(Ok(summary)) => {
                let text = summary.message.content.trim().to_string();
                if text.is_empty() {
                    warn!("turn summary came back empty");
                    None
                } else {
                    Some(text)
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "turn summary generation failed");
                None
            }
            Err(_) => {
                warn!("turn summary generation timed out");
                None
            }
        }
    }
}

/// Deterministic summary synthesized from structured state. Used whenever
/// the model-written summary is missing or malformed, so the next router
/// call never reads a stale continuity channel.
pub fn fallback_summary(session: &SessionState) -> String {
    let register = &session.register;
    let active = register
        .query(&assay_facts::AssumptionFilter { status: Some(Status::Active), ..Default::default() })
        .len();
    let at_risk = register
        .query(&assay_facts::AssumptionFilter { status: Some(Status::AtRisk), ..Default::default() })
        .len();

    let mut parts = vec![format!(
        "Turn {}: {} assumptions tracked ({} active, {} at risk).",
        session.turn_count,
        register.len(),
        active,
        at_risk
    )];
    match session.active_mode() {
        Some(mode) => parts.push(format!("Currently in {mode} mode.")),
        None => parts.push("Still gathering context.".into()),
    }
    if let Some(problem) = &session.skeleton.problem_statement {
        parts.push(format!("Problem under analysis: {problem}"));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use assay_facts::Mode;

    #[test]
    fn fallback_summary_reflects_state() {
        let mut session = SessionState::new();
        session.turn_count = 5;
        session.enter_mode(Mode::Discovery);
        session.skeleton.set_problem_statement("renewals are slipping");

        let summary = fallback_summary(&session);
        assert!(summary.contains("Turn 5"));
        assert!(summary.contains("discovery mode"));
        assert!(summary.contains("renewals are slipping"));
    }

    #[test]
    fn priming_message_mentions_stakeholders() {
        assert!(PRIMING_MESSAGE.contains("stakeholders"));
    }
}
