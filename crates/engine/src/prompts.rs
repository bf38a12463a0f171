//! Prompt templates and the state formatters that feed them.
//!
//! Typed state is serialized to text only here, at the generation-call
//! boundary — nothing upstream passes prompt fragments around.

use assay_core::message::{Message, Role};
use assay_facts::{AssumptionRegister, Confidence, FindingSkeleton, Impact, SessionState};

/// System prompt for the executor (action phase).
pub const SYSTEM_PROMPT: &str = "\
You are an analysis co-pilot that helps people think through problems rigorously. You work collaboratively: you think WITH the user, not FOR them.

You have tools for tracking assumptions and building a finding skeleton. Use them actively as you discover information, not in batch at the end.

## Core Behaviors

1. **Progressive questioning:** Ask 2-3 motivated questions per turn maximum. Every question must explain WHY you're asking it.

2. **Micro-synthesis:** When the routing state says a synthesis is due, summarize what you've learned in 1-2 sentences before asking follow-ups.

3. **Density-to-risk:** Your depth of probing is driven by assumption risk, not the user's tone. If high-impact unvalidated assumptions exist, probe them regardless of pushback. Stay concise, but ask the hard question.

4. **Generative, not blocking:** Make soft guesses and register them as assumptions. Don't stop progress because something is unvalidated: track it and proceed.

5. **Concrete decision criteria:** Always produce specific 'proceed IF' and 'do NOT proceed IF' conditions. Never say 'proceed with caution'.

## Tool Usage

Call tools AS you discover information:
- register_assumption whenever you identify something assumed but not validated
- update_assumption_status when new info confirms or invalidates an assumption
- set_problem_statement when you can articulate the core problem
- add_stakeholder when you identify someone relevant
- record_probe_fired when you actively explore a probe's questions
- record_pattern_fired when a pattern's trigger conditions are met
- update_conversation_summary at the END of every turn (mandatory)
- complete_mode after rendering the final artifact and closing recommendations

## What NOT To Do
- Don't accept the problem as stated: probe for embedded solutions and hidden assumptions
- Don't dump a wall of analysis unprompted
- Don't list five risks at once; surface the highest-priority one first
- Don't assign tasks to the user; surface the dependency and ask about the relationship instead";

/// System line for the router (decision phase).
pub const ROUTER_SYSTEM: &str =
    "You are a routing engine. Respond ONLY with valid JSON. No markdown, no explanation.";

/// Build the router prompt from session state.
pub fn router_prompt(session: &SessionState, probe_keys: &[&str], pattern_keys: &[&str]) -> String {
    let routing = &session.routing;
    let phase = match session.active_mode() {
        Some(mode) => format!("mode_active ({mode})"),
        None => "gathering".into(),
    };

    let summary = if routing.conversation_summary.is_empty() {
        "(No summary yet. First turn.)"
    } else {
        routing.conversation_summary.as_str()
    };

    format!(
        "You are in ROUTING MODE. Analyze the current state and decide what to do next. Respond ONLY with a JSON object.\n\n\
         ## Original Problem Statement (Turn 1)\n{original}\n\n\
         ## Rolling Summary (written by the action phase last turn)\n{summary}\n\n\
         ## Current State\n\
         Turn count: {turn}\n\
         Phase: {phase}\n\
         Probes fired: {probes:?}\n\
         Patterns fired: {patterns:?}\n\
         Micro-synthesis due: {synthesis}\n\
         Critical mass reached: {critical}\n\
         Org context domain: {domain}\n\n\
         ## Assumption Register Summary\n{assumptions}\n\n\
         ## Conversation So Far (last 3 turns)\n{recent}\n\n\
         ## Available Guidance Units\n\
         Probes: {probe_keys:?}\n\
         Patterns: {pattern_keys:?}\n\n\
         ## Routing Logic\n\
         1. If phase is gathering: once the problem is articulable in 2-3 sentences, primary stakeholders are named, and the highest-impact assumptions are surfaced, set enter_mode to \"discovery\" (or \"evaluation\" when a concrete solution is on the table with a validated problem).\n\
         2. Pick at most one active probe per turn, by key, from the available probes.\n\
         3. List triggered pattern keys when their trigger conditions are met by the conversation.\n\
         4. Flag direct contradictions between new information and registered assumptions in conflict_flags.\n\
         5. Set requires_retrieval to false ONLY for filler turns: acknowledgments and continuation cues carrying no new substantive information (\"yes\", \"go on\", \"sounds right\").\n\
         6. If the active mode's deliverable has been rendered and closing recommendations given, set next_action to \"complete_mode\".\n\
         7. Set enrichment_needed to true when the problem domain has shifted materially from the org context domain above.\n\n\
         ## Output Format\n\
         {{\"next_action\": \"ask_questions | run_probe | synthesize | continue_mode | complete_mode\",\n\
          \"enter_mode\": null,\n\
          \"active_probe\": null,\n\
          \"triggered_patterns\": [],\n\
          \"requires_retrieval\": true,\n\
          \"conflict_flags\": [],\n\
          \"enrichment_needed\": false,\n\
          \"reasoning\": \"one sentence\"}}",
        original = session.original_input().unwrap_or("(none yet)"),
        summary = summary,
        turn = session.turn_count,
        phase = phase,
        probes = routing.probe_names(),
        patterns = routing.pattern_names(),
        synthesis = routing.micro_synthesis_due,
        critical = routing.critical_mass_reached,
        domain = if session.org.last_enriched_domain.is_empty() {
            "(none)"
        } else {
            session.org.last_enriched_domain.as_str()
        },
        assumptions = assumption_summary(&session.register),
        recent = format_messages(session.recent_messages(3)),
    )
}

/// Concise register summary for the router: one line per assumption,
/// high-impact guesses flagged.
pub fn assumption_summary(register: &AssumptionRegister) -> String {
    if register.is_empty() {
        return "No assumptions registered yet.".into();
    }
    let mut lines = Vec::new();
    for a in register.iter() {
        let flag = if a.impact == Impact::High && a.confidence == Confidence::Guessed {
            "[!] "
        } else {
            ""
        };
        lines.push(format!(
            "{}{}: [{}/{}/{}] {}",
            flag,
            a.id,
            a.impact.as_str(),
            a.confidence.as_str(),
            a.status.as_str(),
            a.claim
        ));
    }
    lines.join("\n")
}

/// Full register dump for the executor prompt.
pub fn format_assumptions(register: &AssumptionRegister) -> String {
    if register.is_empty() {
        return "No assumptions registered yet.".into();
    }
    let mut lines = Vec::new();
    for a in register.iter() {
        lines.push(format!(
            "- **{}** [{}] {}\n  Impact: {} | Confidence: {} | Status: {}\n  Basis: {} | Surfaced by: {}\n  Depends on: {:?} | Action: {}",
            a.id,
            a.category.as_str(),
            a.claim,
            a.impact.as_str(),
            a.confidence.as_str(),
            a.status.as_str(),
            a.basis,
            a.surfaced_by,
            a.depends_on,
            a.recommended_action
        ));
    }
    lines.join("\n")
}

/// Compact skeleton rendering for prompts.
pub fn format_skeleton(skeleton: &FindingSkeleton) -> String {
    let mut parts = Vec::new();
    if let Some(p) = &skeleton.problem_statement {
        parts.push(format!("Problem: {p}"));
    }
    if let Some(a) = &skeleton.target_audience {
        parts.push(format!("Audience: {a}"));
    }
    if skeleton.stakeholder_count() > 0 {
        let lines: Vec<String> = skeleton
            .stakeholders()
            .map(|s| format!("  - {} ({})", s.name, s.role.as_str()))
            .collect();
        parts.push(format!("Stakeholders:\n{}", lines.join("\n")));
    }
    let metrics = &skeleton.success_metrics;
    if metrics.any_set() {
        parts.push(format!(
            "Metrics: Leading={:?}, Lagging={:?}, Anti={:?}",
            metrics.leading, metrics.lagging, metrics.anti_metric
        ));
    }
    if !skeleton.decision_criteria.proceed_if.is_empty() {
        parts.push(format!("Proceed IF: {}", skeleton.decision_criteria.proceed_if.join("; ")));
    }
    if !skeleton.decision_criteria.do_not_proceed_if.is_empty() {
        parts.push(format!(
            "Do NOT IF: {}",
            skeleton.decision_criteria.do_not_proceed_if.join("; ")
        ));
    }
    if let Some(solution) = &skeleton.solution {
        parts.push(format!("Solution: {}", solution.name));
        parts.push(format!("Description: {}", solution.description));
    }
    for dim in assay_facts::RiskDimension::ALL {
        if let Some(r) = skeleton.risk(dim) {
            parts.push(format!("{}: {} ({})", dim.display_name(), r.level.as_str(), r.summary));
        }
    }
    if let Some(call) = &skeleton.go_no_go {
        parts.push(format!("Go/No-Go: {}", call.recommendation.display_name()));
    }
    if parts.is_empty() {
        "Finding skeleton is empty.".into()
    } else {
        parts.join("\n")
    }
}

/// Wrap large user inputs in tags for instruction isolation.
fn format_user_input(content: &str) -> String {
    if content.len() > 500 {
        format!("<user_context>\n{content}\n</user_context>")
    } else {
        content.to_string()
    }
}

/// Format transcript messages for prompt injection.
pub fn format_messages(messages: &[Message]) -> String {
    let mut formatted = Vec::new();
    for m in messages {
        let content = match m.role {
            Role::User => format_user_input(&m.content),
            _ => m.content.clone(),
        };
        let role = match m.role {
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
            Role::System => "SYSTEM",
            Role::Tool => "TOOL",
        };
        formatted.push(format!("**{role}:** {content}"));
    }
    formatted.join("\n\n")
}

/// Transcript with the truncation guard applied: when the estimated token
/// count exceeds the budget, keep the first message, a truncation
/// sentinel, and the most recent window.
pub fn format_transcript_bounded(messages: &[Message], token_budget: usize) -> String {
    let estimated: usize = messages.iter().map(Message::estimated_tokens).sum();
    if estimated <= token_budget || messages.len() <= 22 {
        return format_messages(messages);
    }

    let mut truncated: Vec<Message> = Vec::with_capacity(22);
    truncated.push(messages[0].clone());
    truncated.push(Message::assistant("[...earlier conversation truncated for context length...]"));
    truncated.extend_from_slice(&messages[messages.len() - 20..]);
    format_messages(&truncated)
}

/// Summary prompt for the post-turn summarizer call.
pub fn turn_summary_prompt(user_message: &str, assistant_response: &str) -> String {
    let clip = |s: &str| -> String { s.chars().take(1000).collect() };
    format!(
        "Summarize this conversation exchange in 1-2 sentences. \
         Focus on what was discussed and any decisions or assumptions made.\n\n\
         User: {}\n\nAssistant: {}",
        clip(user_message),
        clip(assistant_response)
    )
}
