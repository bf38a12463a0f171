//! The turn executor (action phase).
//!
//! Drives a bounded tool-call loop against the generation service: each
//! response's tool calls are parsed into typed commands, applied to the
//! session, and their results fed back until the model stops requesting
//! tools or the iteration guard trips.
//!
//! Artifact rendering is special-cased: the rendered document goes
//! straight into the user-visible response while the model receives only
//! a short acknowledgment, which keeps self-referential artifact content
//! from inflating later turns.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use assay_core::event::{DomainEvent, EventBus};
use assay_core::message::Message;
use assay_core::provider::{Provider, ProviderRequest};
use assay_facts::SessionState;

use crate::assembler::ContextBundle;
use crate::command::{self, Command};
use crate::prompts;
use crate::router::RoutingDecision;

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub model: String,
    pub max_tokens: u32,
    pub max_iterations: u32,
    pub context_token_budget: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: 8096,
            max_iterations: 8,
            context_token_budget: 150_000,
        }
    }
}

/// What a completed execution produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The user-visible response (text plus any rendered artifacts).
    pub response_text: String,

    /// Commands successfully applied during the loop.
    pub commands_applied: usize,

    /// Whether the rolling summary was replaced (the executor's
    /// end-of-turn obligation).
    pub summary_updated: bool,

    /// Whether the active mode signaled completion.
    pub mode_completed: bool,
}

/// The action-phase runner.
pub struct TurnExecutor {
    provider: Arc<dyn Provider>,
    options: ExecutorOptions,
    events: Arc<EventBus>,
}

impl TurnExecutor {
    pub fn new(provider: Arc<dyn Provider>, options: ExecutorOptions, events: Arc<EventBus>) -> Self {
        Self { provider, options, events }
    }

    /// Run the tool-call loop for one turn. Mutations already applied are
    /// kept on every failure path; the user always gets a response.
    pub async fn execute(
        &self,
        decision: &RoutingDecision,
        bundle: &ContextBundle,
        session: &mut SessionState,
    ) -> TurnOutcome {
        let prompt = self.build_prompt(decision, bundle, session);
        let mut api_messages =
            vec![Message::system(prompts::SYSTEM_PROMPT), Message::user(prompt)];

        let tools = command::definitions();
        let mut outcome = TurnOutcome {
            response_text: String::new(),
            commands_applied: 0,
            summary_updated: false,
            mode_completed: false,
        };

        let mut iteration = 0u32;
        loop {
            iteration += 1;
            if iteration > self.options.max_iterations {
                warn!(iterations = iteration, "max tool iterations reached, stopping loop");
                break;
            }
            debug!(iteration, "executor loop iteration");

            let request = ProviderRequest {
                model: self.options.model.clone(),
                messages: api_messages.clone(),
                temperature: 0.7,
                max_tokens: Some(self.options.max_tokens),
                tools: tools.clone(),
            };

            let response = match self.provider.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "executor generation call failed");
                    if outcome.response_text.is_empty() {
                        outcome.response_text = "I hit a temporary issue processing your message. \
                                                 Your conversation state is preserved. Please try again."
                            .into();
                    } else {
                        outcome.response_text.push_str(
                            "\n\n---\nI encountered an error mid-response. What I've shared above \
                             is still valid. Please send your next message and I'll continue.",
                        );
                    }
                    return outcome;
                }
            };

            if let Some(usage) = &response.usage {
                self.events.publish(DomainEvent::ResponseGenerated {
                    conversation_id: session.id.to_string(),
                    model: response.model.clone(),
                    tokens_used: usage.total_tokens,
                    timestamp: Utc::now(),
                });
            }

            if !response.message.content.is_empty() {
                if !outcome.response_text.is_empty() {
                    outcome.response_text.push('\n');
                }
                outcome.response_text.push_str(&response.message.content);
            }

            if response.message.tool_calls.is_empty() {
                break;
            }

            let tool_calls = response.message.tool_calls.clone();
            api_messages.push(response.message);

            for call in &tool_calls {
                let result = match Command::parse(&call.name, call.arguments.clone()) {
                    Ok(cmd) => {
                        let applied = command::apply(cmd, session);
                        outcome.commands_applied += 1;
                        outcome.summary_updated |= applied.summary_updated;
                        outcome.mode_completed |= applied.completed_mode;
                        self.events.publish(DomainEvent::CommandApplied {
                            name: call.name.clone(),
                            success: true,
                            timestamp: Utc::now(),
                        });

                        if let Some(artifact) = applied.rendered_artifact {
                            // Shown to the user directly; the model gets
                            // only the acknowledgment in `result`.
                            outcome.response_text.push_str("\n\n");
                            outcome.response_text.push_str(&artifact);
                        }
                        applied.result
                    }
                    Err(e) => {
                        warn!(tool = %call.name, error = %e, "rejected tool call");
                        self.events.publish(DomainEvent::CommandApplied {
                            name: call.name.clone(),
                            success: false,
                            timestamp: Utc::now(),
                        });
                        format!("Error: {e}")
                    }
                };
                api_messages.push(Message::tool_result(&call.id, result));
            }
        }

        if outcome.response_text.trim().is_empty() {
            warn!("executor produced no visible text, likely token exhaustion from tool calls");
            outcome.response_text = "I processed your input but couldn't generate a visible \
                                     response. Please ask a follow-up question."
                .into();
        }

        info!(
            commands = outcome.commands_applied,
            summary_updated = outcome.summary_updated,
            "turn executed"
        );
        outcome
    }

    fn build_prompt(
        &self,
        decision: &RoutingDecision,
        bundle: &ContextBundle,
        session: &SessionState,
    ) -> String {
        let decision_json =
            serde_json::to_string_pretty(decision).unwrap_or_else(|_| "{}".into());
        let is_first_mode_turn =
            session.active_mode().is_some() && session.routing.mode_turn_count == 0;

        format!(
            "## Routing Decision\n{decision_json}\n\n\
             {bundle}\n\n\
             ## Conversation\n{transcript}\n\n\
             ## Turn\n\
             Turn number: {turn}\n\
             Active mode: {mode}\n\
             First turn in mode: {first}",
            decision_json = decision_json,
            bundle = bundle.render(),
            transcript = prompts::format_transcript_bounded(
                &session.messages,
                self.options.context_token_budget
            ),
            turn = session.turn_count,
            mode = session
                .active_mode()
                .map(|m| m.to_string())
                .unwrap_or_else(|| "none (gathering)".into()),
            first = is_first_mode_turn,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assay_core::error::ProviderError;
    use assay_core::message::MessageToolCall;
    use assay_core::provider::ProviderResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Provider that plays back a scripted sequence of responses and
    /// records every request it sees.
    struct ScriptedProvider {
        script: Mutex<Vec<ProviderResponse>>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<ProviderResponse>) -> Self {
            Self {
                script: Mutex::new(script),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                return Err(ProviderError::Network("script exhausted".into()));
            }
            Ok(script.remove(0))
        }
    }

    fn text_response(text: &str) -> ProviderResponse {
        ProviderResponse {
            message: Message::assistant(text),
            usage: None,
            model: "scripted".into(),
        }
    }

    fn tool_response(text: &str, calls: Vec<(&str, &str, serde_json::Value)>) -> ProviderResponse {
        let mut message = Message::assistant(text);
        message.tool_calls = calls
            .into_iter()
            .map(|(id, name, arguments)| MessageToolCall {
                id: id.into(),
                name: name.into(),
                arguments,
            })
            .collect();
        ProviderResponse { message, usage: None, model: "scripted".into() }
    }

    fn executor(script: Vec<ProviderResponse>) -> (TurnExecutor, Arc<EventBus>) {
        let events = Arc::new(EventBus::default());
        let exec = TurnExecutor::new(
            Arc::new(ScriptedProvider::new(script)),
            ExecutorOptions { max_iterations: 5, ..Default::default() },
            events.clone(),
        );
        (exec, events)
    }

    fn bundle() -> ContextBundle {
        ContextBundle {
            project_context: "No project context available yet.".into(),
            assumption_register: "No assumptions registered yet.".into(),
            finding_skeleton: "Finding skeleton is empty.".into(),
            routing_context: "Rolling summary: (none yet)".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn plain_text_turn() {
        let (exec, _) = executor(vec![text_response("What outcome are you after?")]);
        let mut session = SessionState::new();
        session.turn_count = 1;

        let outcome = exec
            .execute(&RoutingDecision::fallback("t"), &bundle(), &mut session)
            .await;
        assert_eq!(outcome.response_text, "What outcome are you after?");
        assert_eq!(outcome.commands_applied, 0);
        assert!(!outcome.summary_updated);
    }

    #[tokio::test]
    async fn tool_loop_applies_commands_and_continues() {
        let (exec, _) = executor(vec![
            tool_response(
                "Let me capture that.",
                vec![
                    (
                        "t1",
                        "register_assumption",
                        json!({
                            "claim": "exec sponsor supports this",
                            "category": "organizational",
                            "impact": "high",
                            "confidence": "guessed",
                            "basis": "user said so",
                            "surfaced_by": "stakeholder-mapping"
                        }),
                    ),
                    ("t2", "update_conversation_summary", json!({"summary": "sponsor risk surfaced"})),
                ],
            ),
            text_response("Who actually owns the budget?"),
        ]);

        let mut session = SessionState::new();
        session.turn_count = 2;

        let outcome = exec
            .execute(&RoutingDecision::fallback("t"), &bundle(), &mut session)
            .await;

        assert_eq!(outcome.commands_applied, 2);
        assert!(outcome.summary_updated);
        assert_eq!(session.register.len(), 1);
        assert_eq!(session.routing.conversation_summary, "sponsor risk surfaced");
        assert!(outcome.response_text.contains("Let me capture that."));
        assert!(outcome.response_text.contains("Who actually owns the budget?"));
    }

    #[tokio::test]
    async fn artifact_is_shown_to_user_but_acked_to_model() {
        let mut session = SessionState::new();
        session.skeleton.set_problem_statement("p");
        session.skeleton.add_stakeholder(
            "Dana",
            assay_facts::StakeholderRole::DecisionAuthority,
            true,
            "",
        );
        session.skeleton.update_success_metrics(Some("m".into()), None, None);
        session
            .skeleton
            .add_decision_criterion(assay_facts::CriterionKind::ProceedIf, "c");

        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response(
                "Here's the brief:",
                vec![("t1", "render_artifact", json!({"artifact_type": "problem_brief"}))],
            ),
            text_response("Anything to adjust?"),
        ]));
        let events = Arc::new(EventBus::default());
        let exec = TurnExecutor::new(
            provider.clone(),
            ExecutorOptions { max_iterations: 5, ..Default::default() },
            events,
        );

        let outcome = exec
            .execute(&RoutingDecision::fallback("t"), &bundle(), &mut session)
            .await;

        // User sees the rendered document.
        assert!(outcome.response_text.contains("# Problem Brief"));

        // The model's tool result is only the acknowledgment.
        let requests = provider.requests.lock().unwrap();
        let followup = &requests[1];
        let tool_result = followup
            .messages
            .iter()
            .find(|m| m.role == assay_core::message::Role::Tool)
            .unwrap();
        assert_eq!(tool_result.content, "Artifact rendered and displayed to user.");
        assert!(!tool_result.content.contains("# Problem Brief"));
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected_not_fatal() {
        let (exec, _) = executor(vec![
            tool_response("Trying something odd.", vec![("t1", "launch_missiles", json!({}))]),
            text_response("Back on track."),
        ]);
        let mut session = SessionState::new();

        let outcome = exec
            .execute(&RoutingDecision::fallback("t"), &bundle(), &mut session)
            .await;

        assert_eq!(outcome.commands_applied, 0);
        assert!(outcome.response_text.contains("Back on track."));
    }

    #[tokio::test]
    async fn provider_failure_midway_keeps_applied_mutations() {
        // First response applies a command, then the script runs dry,
        // simulating a mid-loop provider failure.
        let (exec, _) = executor(vec![tool_response(
            "Recording.",
            vec![(
                "t1",
                "register_assumption",
                json!({
                    "claim": "c", "category": "value", "impact": "low",
                    "confidence": "guessed", "basis": "b", "surfaced_by": "s"
                }),
            )],
        )]);
        let mut session = SessionState::new();

        let outcome = exec
            .execute(&RoutingDecision::fallback("t"), &bundle(), &mut session)
            .await;

        // Mutation survived the failure; the user got a graceful trailer.
        assert_eq!(session.register.len(), 1);
        assert!(outcome.response_text.contains("still valid"));
    }

    #[tokio::test]
    async fn iteration_guard_stops_runaway_loop() {
        // Provider endlessly requests the same tool.
        let endless: Vec<ProviderResponse> = (0..10)
            .map(|i| {
                tool_response(
                    "",
                    vec![(
                        "t",
                        "update_conversation_summary",
                        json!({"summary": format!("loop {i}")}),
                    )],
                )
            })
            .collect();
        let (exec, _) = executor(endless);
        let mut session = SessionState::new();

        let outcome = exec
            .execute(&RoutingDecision::fallback("t"), &bundle(), &mut session)
            .await;

        // max_iterations = 5: the guard tripped before the script drained.
        assert!(outcome.commands_applied <= 5);
        assert!(!outcome.response_text.is_empty());
    }

    #[tokio::test]
    async fn empty_response_gets_fallback_text() {
        let (exec, _) = executor(vec![text_response("")]);
        let mut session = SessionState::new();
        let outcome = exec
            .execute(&RoutingDecision::fallback("t"), &bundle(), &mut session)
            .await;
        assert!(outcome.response_text.contains("couldn't generate a visible response"));
    }
}
