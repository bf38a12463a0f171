//! Artifact rendering — turns the skeleton and register into deliverable
//! markdown documents.
//!
//! Rendering refuses when mandatory fields are still empty; the refusal
//! message is fed back to the model on the tool-result channel so it can
//! populate the missing fields and retry.

use serde::{Deserialize, Serialize};

use crate::assumption::Status;
use crate::session::SessionState;
use crate::skeleton::RiskDimension;

/// Which deliverable to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    ProblemBrief,
    SolutionEvaluationBrief,
}

/// Mandatory fields were empty; rendering was refused.
#[derive(Debug, Clone)]
pub struct MissingFields {
    pub kind: ArtifactKind,
    pub fields: Vec<&'static str>,
}

impl MissingFields {
    /// Corrective message for the model.
    pub fn to_warning(&self) -> String {
        let required = match self.kind {
            ArtifactKind::ProblemBrief => {
                "set_problem_statement, add_stakeholder, update_success_metrics, and add_decision_criterion"
            }
            ArtifactKind::SolutionEvaluationBrief => {
                "set_solution_info, set_risk_assessment, and set_go_no_go"
            }
        };
        format!(
            "WARNING: The following skeleton fields are empty: {}. Call {} before rendering the artifact, then try again.",
            self.fields.join(", "),
            required
        )
    }
}

/// Render an artifact from current session state.
pub fn render(kind: ArtifactKind, session: &SessionState) -> Result<String, MissingFields> {
    match kind {
        ArtifactKind::ProblemBrief => render_problem_brief(session),
        ArtifactKind::SolutionEvaluationBrief => render_solution_evaluation(session),
    }
}

fn render_problem_brief(session: &SessionState) -> Result<String, MissingFields> {
    let skeleton = &session.skeleton;

    let mut missing = Vec::new();
    if skeleton.problem_statement.is_none() {
        missing.push("problem_statement");
    }
    if skeleton.stakeholder_count() == 0 {
        missing.push("stakeholders");
    }
    if !skeleton.success_metrics.any_set() {
        missing.push("success_metrics");
    }
    if !skeleton.decision_criteria.any_set() {
        missing.push("decision_criteria");
    }
    if !missing.is_empty() {
        return Err(MissingFields { kind: ArtifactKind::ProblemBrief, fields: missing });
    }

    let mut assumption_rows = String::new();
    for a in session.register.iter() {
        if matches!(a.status, Status::Active | Status::AtRisk) {
            assumption_rows.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                a.id,
                a.claim,
                a.impact.as_str(),
                a.confidence.as_str(),
                a.status.as_str()
            ));
        }
    }
    if assumption_rows.is_empty() {
        assumption_rows.push_str("| - | No assumptions registered yet | - | - | - |\n");
    }

    let mut stakeholder_text = String::new();
    for s in skeleton.stakeholders() {
        let mark = if s.validated { "[x]" } else { "[ ]" };
        stakeholder_text.push_str(&format!(
            "- {} **{}** ({}): {}\n",
            mark,
            s.name,
            s.role.as_str(),
            s.notes
        ));
    }

    let metrics = &skeleton.success_metrics;
    let mut metrics_text = String::new();
    if let Some(v) = &metrics.leading {
        metrics_text.push_str(&format!("- **Leading:** {v}\n"));
    }
    if let Some(v) = &metrics.lagging {
        metrics_text.push_str(&format!("- **Lagging:** {v}\n"));
    }
    if let Some(v) = &metrics.anti_metric {
        metrics_text.push_str(&format!("- **Anti-metric:** {v}\n"));
    }

    let proceed = bullet_list(&skeleton.decision_criteria.proceed_if);
    let do_not = bullet_list(&skeleton.decision_criteria.do_not_proceed_if);

    Ok(format!(
        "# Problem Brief\n\n\
         ## Problem Statement\n{}\n\n\
         ## Target Audience\n{}\n\n\
         ## Stakeholders\n{}\n\
         ## Key Assumptions\n\n\
         | ID | Claim | Impact | Confidence | Status |\n\
         |----|-------|--------|------------|--------|\n\
         {}\n\
         ## Success Metrics\n{}\n\
         ## Decision Criteria\n\n\
         **Worth pursuing IF:**\n{}\n\n\
         **Do NOT invest IF:**\n{}\n",
        skeleton.problem_statement.as_deref().unwrap_or("_Not yet defined_"),
        skeleton.target_audience.as_deref().unwrap_or("_Not yet defined_"),
        or_placeholder(&stakeholder_text, "_None identified yet_\n"),
        assumption_rows,
        or_placeholder(&metrics_text, "_Not yet defined_\n"),
        or_placeholder(&proceed, "_Not yet defined_"),
        or_placeholder(&do_not, "_Not yet defined_"),
    ))
}

fn render_solution_evaluation(session: &SessionState) -> Result<String, MissingFields> {
    let skeleton = &session.skeleton;

    let mut missing = Vec::new();
    if skeleton.solution.is_none() {
        missing.push("solution_info");
    }
    if skeleton.risk(RiskDimension::Value).is_none() {
        missing.push("value_risk");
    }
    if skeleton.go_no_go.is_none() {
        missing.push("go_no_go");
    }
    if !missing.is_empty() {
        return Err(MissingFields {
            kind: ArtifactKind::SolutionEvaluationBrief,
            fields: missing,
        });
    }

    let solution = skeleton.solution.as_ref().expect("checked above");
    let call = skeleton.go_no_go.as_ref().expect("checked above");

    let mut risk_text = String::new();
    for dim in RiskDimension::ALL {
        match skeleton.risk(dim) {
            Some(r) => {
                risk_text.push_str(&format!(
                    "### {}: {}\n{}\n",
                    dim.display_name(),
                    r.level.as_str().to_uppercase(),
                    r.summary
                ));
                if !r.evidence_for.is_empty() {
                    risk_text.push_str(&format!(
                        "\n**Supporting evidence:**\n{}\n",
                        bullet_list(&r.evidence_for)
                    ));
                }
                if !r.evidence_against.is_empty() {
                    risk_text.push_str(&format!("\n**Concerns:**\n{}\n", bullet_list(&r.evidence_against)));
                }
            }
            None => risk_text.push_str(&format!("### {}: _Not assessed_\n", dim.display_name())),
        }
        risk_text.push('\n');
    }

    let mut assumption_rows = String::new();
    for a in session.register.iter() {
        if matches!(a.status, Status::Active | Status::AtRisk) {
            assumption_rows.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                a.id,
                a.claim,
                a.impact.as_str(),
                a.confidence.as_str(),
                a.recommended_action
            ));
        }
    }
    if assumption_rows.is_empty() {
        assumption_rows.push_str("| - | No assumptions registered | - | - | - |\n");
    }

    let validation_text = match &skeleton.validation_plan {
        Some(plan) => {
            let mut text = format!("**Approach:** {}\n{}\n", plan.approach.as_str(), plan.description);
            if let Some(t) = &plan.timeline {
                text.push_str(&format!("\n**Timeline:** {t}\n"));
            }
            text.push_str(&format!("\n**Success criteria:** {}\n", plan.success_criteria));
            text
        }
        None => "_Not yet defined_".into(),
    };

    Ok(format!(
        "# Solution Evaluation: {}\n\n\
         ## Executive Summary\n{}\n\n\
         ## Problem-Solution Fit\nEvaluated against: {}\n\n\
         ## Risk Assessment\n\n{}\
         ## Build vs. Buy Consideration\n{}\n\n\
         ## Key Assumptions Requiring Validation\n\n\
         | ID | Assumption | Impact | Confidence | Recommended Validation |\n\
         |----|-----------|--------|------------|----------------------|\n\
         {}\n\
         ## Recommended Validation Approach\n{}\n\
         ## Go/No-Go Assessment\n**Recommendation: {}**\n\n\
         **Proceed IF:**\n{}\n\n\
         **Do NOT proceed IF:**\n{}\n",
        solution.name,
        solution.description,
        skeleton
            .problem_statement
            .as_deref()
            .unwrap_or("_No problem statement from discovery_"),
        risk_text,
        solution.build_vs_buy.as_deref().unwrap_or("_Not applicable or not assessed_"),
        assumption_rows,
        validation_text,
        call.recommendation.display_name(),
        or_placeholder(&bullet_list(&call.conditions), "_Not yet defined_"),
        or_placeholder(&bullet_list(&call.dealbreakers), "_Not yet defined_"),
    ))
}

fn bullet_list(items: &[String]) -> String {
    items.iter().map(|i| format!("- {i}")).collect::<Vec<_>>().join("\n")
}

fn or_placeholder<'a>(text: &'a str, placeholder: &'a str) -> &'a str {
    if text.is_empty() { placeholder } else { text }
}
