//! The turn router (decision phase).
//!
//! A lightweight generation call that inspects fact-store state plus the
//! rolling summary and emits a routing decision. It runs under a context
//! budget an order of magnitude smaller than the executor's and degrades
//! safely: any transport, timeout, or parse failure yields a hardcoded
//! conservative default instead of failing the turn.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use assay_core::message::Message;
use assay_core::provider::{Provider, ProviderRequest};
use assay_facts::{Mode, SessionState};
use assay_knowledge::{GuidanceKind, KnowledgeIndex};

use crate::prompts;

/// What the engine should do this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    AskQuestions,
    RunProbe,
    Synthesize,
    ContinueMode,
    CompleteMode,
}

/// The router's structured output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    #[serde(default = "default_action")]
    pub next_action: NextAction,

    /// Mode to enter this turn, if critical mass was judged reached.
    #[serde(default)]
    pub enter_mode: Option<Mode>,

    /// Key of the guidance unit to drive this turn.
    #[serde(default)]
    pub active_probe: Option<String>,

    /// Keys of patterns whose trigger conditions are met.
    #[serde(default)]
    pub triggered_patterns: Vec<String>,

    /// False only for filler turns; gates all vector index calls.
    #[serde(default = "default_true")]
    pub requires_retrieval: bool,

    /// Direct contradictions between new information and the register.
    #[serde(default)]
    pub conflict_flags: Vec<String>,

    /// The problem domain shifted materially; org context needs enriching.
    #[serde(default)]
    pub enrichment_needed: bool,

    #[serde(default)]
    pub reasoning: String,
}

fn default_action() -> NextAction {
    NextAction::AskQuestions
}

fn default_true() -> bool {
    true
}

impl RoutingDecision {
    /// The conservative default used whenever routing fails.
    pub fn fallback(reason: &str) -> Self {
        Self {
            next_action: NextAction::AskQuestions,
            enter_mode: None,
            active_probe: None,
            triggered_patterns: Vec::new(),
            requires_retrieval: true,
            conflict_flags: Vec::new(),
            enrichment_needed: false,
            reasoning: format!("fallback: {reason}"),
        }
    }
}

/// Parse the router's raw output, stripping a markdown code fence if the
/// model wrapped the JSON despite instructions.
pub fn parse_decision(raw: &str) -> Option<RoutingDecision> {
    let mut text = raw.trim();
    if text.starts_with("```") {
        text = text.trim_start_matches("```json").trim_start_matches("```");
        text = text.trim_end_matches("```").trim();
    }
    serde_json::from_str(text).ok()
}

/// The decision-phase runner.
pub struct TurnRouter {
    provider: Arc<dyn Provider>,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl TurnRouter {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens,
            timeout,
        }
    }

    /// Produce a routing decision. Never fails: every failure path maps to
    /// the conservative default.
    pub async fn route(&self, session: &SessionState, knowledge: &KnowledgeIndex) -> RoutingDecision {
        let probe_keys = knowledge.keys(GuidanceKind::Probe);
        let pattern_keys = knowledge.keys(GuidanceKind::Pattern);
        let prompt = prompts::router_prompt(session, &probe_keys, &pattern_keys);

        let request = ProviderRequest::bare(
            &self.model,
            vec![Message::system(prompts::ROUTER_SYSTEM), Message::user(prompt)],
            self.max_tokens,
        );

        let response = match tokio::time::timeout(self.timeout, self.provider.complete(request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(error = %e, "router call failed, using fallback decision");
                return RoutingDecision::fallback("provider error");
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "router call timed out");
                return RoutingDecision::fallback("timeout");
            }
        };

        match parse_decision(&response.message.content) {
            Some(decision) => {
                info!(
                    action = ?decision.next_action,
                    requires_retrieval = decision.requires_retrieval,
                    probe = decision.active_probe.as_deref().unwrap_or(""),
                    "routing decision"
                );
                decision
            }
            None => {
                warn!(raw = %response.message.content, "unparseable routing output");
                RoutingDecision::fallback("parse failure")
            }
        }
    }
}

/// Apply a decision's state-machine transitions to the session.
///
/// Mode entry happens on the router's judgment; `complete_mode` here is
/// the safety net for completions the executor implied but never
/// signaled.
pub fn apply_transition(session: &mut SessionState, decision: &RoutingDecision) {
    if let Some(mode) = decision.enter_mode {
        if session.active_mode() != Some(mode) {
            info!(mode = %mode, "entering mode");
            session.enter_mode(mode);
        }
    }

    if decision.next_action == NextAction::CompleteMode && session.active_mode().is_some() {
        info!("router safety net: completing mode");
        session.complete_mode();
    }

    if let Some(probe) = &decision.active_probe {
        session.routing.active_probe = probe.clone();
    }
    session.routing.last_requires_retrieval = decision.requires_retrieval;
}

#[cfg(test)]
mod tests {
    use super::*;
    use assay_core::error::ProviderError;
    use assay_core::provider::ProviderResponse;
    use async_trait::async_trait;

    struct ScriptedProvider {
        output: String,
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                message: Message::assistant(self.output.clone()),
                usage: None,
                model: "scripted".into(),
            })
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl Provider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }
    }

    fn router_with(output: &str) -> TurnRouter {
        TurnRouter::new(
            Arc::new(ScriptedProvider { output: output.into() }),
            "test-model",
            500,
            Duration::from_secs(5),
        )
    }

    #[test]
    fn parse_plain_json() {
        let decision = parse_decision(
            r#"{"next_action": "run_probe", "active_probe": "stakeholder-mapping", "requires_retrieval": false}"#,
        )
        .unwrap();
        assert_eq!(decision.next_action, NextAction::RunProbe);
        assert_eq!(decision.active_probe.as_deref(), Some("stakeholder-mapping"));
        assert!(!decision.requires_retrieval);
    }

    #[test]
    fn parse_strips_code_fences() {
        let raw = "```json\n{\"next_action\": \"synthesize\"}\n```";
        let decision = parse_decision(raw).unwrap();
        assert_eq!(decision.next_action, NextAction::Synthesize);
        // Omitted fields take safe defaults.
        assert!(decision.requires_retrieval);
    }

    #[test]
    fn parse_rejects_unknown_action() {
        assert!(parse_decision(r#"{"next_action": "rm_rf_slash"}"#).is_none());
        assert!(parse_decision("not json at all").is_none());
    }

    #[tokio::test]
    async fn route_happy_path() {
        let router = router_with(r#"{"next_action": "ask_questions", "requires_retrieval": true}"#);
        let session = SessionState::new();
        let decision = router.route(&session, &KnowledgeIndex::builtin()).await;
        assert_eq!(decision.next_action, NextAction::AskQuestions);
        assert!(!decision.reasoning.starts_with("fallback"));
    }

    #[tokio::test]
    async fn route_falls_back_on_provider_error() {
        let router = TurnRouter::new(
            Arc::new(FailingProvider),
            "test-model",
            500,
            Duration::from_secs(5),
        );
        let decision = router.route(&SessionState::new(), &KnowledgeIndex::builtin()).await;
        assert_eq!(decision.next_action, NextAction::AskQuestions);
        assert!(decision.requires_retrieval);
        assert!(decision.reasoning.contains("provider error"));
    }

    #[tokio::test]
    async fn route_falls_back_on_garbage_output() {
        let router = router_with("I think you should probably ask some questions?");
        let decision = router.route(&SessionState::new(), &KnowledgeIndex::builtin()).await;
        assert!(decision.reasoning.contains("parse failure"));
        assert!(decision.requires_retrieval);
    }

    #[test]
    fn transition_enters_mode_once() {
        let mut session = SessionState::new();
        let mut decision = RoutingDecision::fallback("test");
        decision.enter_mode = Some(Mode::Discovery);
        decision.active_probe = Some("evidence-audit".into());

        apply_transition(&mut session, &decision);
        assert_eq!(session.active_mode(), Some(Mode::Discovery));
        assert_eq!(session.routing.active_probe, "evidence-audit");

        session.routing.mode_turn_count = 2;
        apply_transition(&mut session, &decision);
        // Re-entry is a no-op.
        assert_eq!(session.routing.mode_turn_count, 2);
    }

    #[test]
    fn transition_safety_net_completes_mode() {
        let mut session = SessionState::new();
        session.enter_mode(Mode::Evaluation);

        let mut decision = RoutingDecision::fallback("test");
        decision.next_action = NextAction::CompleteMode;
        apply_transition(&mut session, &decision);
        assert_eq!(session.active_mode(), None);
    }
}
