//! The finding skeleton — the structured work product that fills in
//! progressively across turns.
//!
//! Every mutation is a named single-field operation; there is no bulk
//! rewrite path. Fields are either unset or hold the most recently
//! confirmed value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Why a stakeholder matters to the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeholderRole {
    DecisionAuthority,
    PainHolder,
    StatusQuoBeneficiary,
    ExecutionDependency,
}

impl StakeholderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DecisionAuthority => "decision_authority",
            Self::PainHolder => "pain_holder",
            Self::StatusQuoBeneficiary => "status_quo_beneficiary",
            Self::ExecutionDependency => "execution_dependency",
        }
    }
}

/// A stakeholder identified during analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stakeholder {
    /// Skeleton-assigned id ("S1", "S2", ...)
    pub id: String,
    pub name: String,
    pub role: StakeholderRole,
    #[serde(default)]
    pub validated: bool,
    #[serde(default)]
    pub notes: String,
}

/// Leading/lagging/anti success metrics. Each field updates independently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuccessMetrics {
    pub leading: Option<String>,
    pub lagging: Option<String>,
    pub anti_metric: Option<String>,
}

impl SuccessMetrics {
    pub fn any_set(&self) -> bool {
        self.leading.is_some() || self.lagging.is_some() || self.anti_metric.is_some()
    }
}

/// Which side of the decision a criterion argues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionKind {
    ProceedIf,
    DoNotProceedIf,
}

/// Concrete proceed / do-not-proceed conditions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionCriteria {
    pub proceed_if: Vec<String>,
    pub do_not_proceed_if: Vec<String>,
}

impl DecisionCriteria {
    pub fn any_set(&self) -> bool {
        !self.proceed_if.is_empty() || !self.do_not_proceed_if.is_empty()
    }
}

/// The four risk dimensions assessed during solution evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskDimension {
    Value,
    Usability,
    Feasibility,
    Viability,
}

impl RiskDimension {
    pub const ALL: [RiskDimension; 4] = [
        Self::Value,
        Self::Usability,
        Self::Feasibility,
        Self::Viability,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Value => "Value Risk",
            Self::Usability => "Usability Risk",
            Self::Feasibility => "Feasibility Risk",
            Self::Viability => "Viability Risk",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Assessment of one risk dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub summary: String,
    #[serde(default)]
    pub evidence_for: Vec<String>,
    #[serde(default)]
    pub evidence_against: Vec<String>,
}

/// How the riskiest assumption should be validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationApproach {
    PaintedDoor,
    Concierge,
    TechnicalSpike,
    WizardOfOz,
    Prototype,
    Other,
}

impl ValidationApproach {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaintedDoor => "painted_door",
            Self::Concierge => "concierge",
            Self::TechnicalSpike => "technical_spike",
            Self::WizardOfOz => "wizard_of_oz",
            Self::Prototype => "prototype",
            Self::Other => "other",
        }
    }
}

/// The recommended validation plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationPlan {
    pub riskiest_assumption: String,
    pub approach: ValidationApproach,
    pub description: String,
    pub timeline: Option<String>,
    pub success_criteria: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoNoGo {
    Go,
    ConditionalGo,
    Pivot,
    NoGo,
}

impl GoNoGo {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Go => "GO",
            Self::ConditionalGo => "CONDITIONAL GO",
            Self::Pivot => "PIVOT",
            Self::NoGo => "NO GO",
        }
    }
}

/// The final go/no-go recommendation with its conditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoNoGoCall {
    pub recommendation: GoNoGo,
    pub conditions: Vec<String>,
    pub dealbreakers: Vec<String>,
}

/// What solution is being evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionInfo {
    pub name: String,
    pub description: String,
    pub build_vs_buy: Option<String>,
}

/// The progressively-filled work product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindingSkeleton {
    pub problem_statement: Option<String>,
    pub target_audience: Option<String>,

    stakeholders: BTreeMap<String, Stakeholder>,
    stakeholder_counter: u32,

    pub success_metrics: SuccessMetrics,
    pub decision_criteria: DecisionCriteria,

    pub solution: Option<SolutionInfo>,
    pub risks: BTreeMap<RiskDimension, RiskAssessment>,
    pub validation_plan: Option<ValidationPlan>,
    pub go_no_go: Option<GoNoGoCall>,
}

impl FindingSkeleton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_problem_statement(&mut self, text: impl Into<String>) {
        self.problem_statement = Some(text.into());
    }

    pub fn set_target_audience(&mut self, text: impl Into<String>) {
        self.target_audience = Some(text.into());
    }

    /// Add a stakeholder, returning the assigned id.
    pub fn add_stakeholder(
        &mut self,
        name: impl Into<String>,
        role: StakeholderRole,
        validated: bool,
        notes: impl Into<String>,
    ) -> String {
        self.stakeholder_counter += 1;
        let id = format!("S{}", self.stakeholder_counter);
        self.stakeholders.insert(
            id.clone(),
            Stakeholder {
                id: id.clone(),
                name: name.into(),
                role,
                validated,
                notes: notes.into(),
            },
        );
        id
    }

    pub fn stakeholders(&self) -> impl Iterator<Item = &Stakeholder> {
        self.stakeholders.values()
    }

    pub fn stakeholder_count(&self) -> usize {
        self.stakeholders.len()
    }

    /// Partial metrics update: only provided fields change.
    pub fn update_success_metrics(
        &mut self,
        leading: Option<String>,
        lagging: Option<String>,
        anti_metric: Option<String>,
    ) {
        if let Some(v) = leading {
            self.success_metrics.leading = Some(v);
        }
        if let Some(v) = lagging {
            self.success_metrics.lagging = Some(v);
        }
        if let Some(v) = anti_metric {
            self.success_metrics.anti_metric = Some(v);
        }
    }

    pub fn add_decision_criterion(&mut self, kind: CriterionKind, condition: impl Into<String>) {
        match kind {
            CriterionKind::ProceedIf => self.decision_criteria.proceed_if.push(condition.into()),
            CriterionKind::DoNotProceedIf => {
                self.decision_criteria.do_not_proceed_if.push(condition.into())
            }
        }
    }

    pub fn set_solution_info(&mut self, info: SolutionInfo) {
        // Build-vs-buy is optional on repeat calls; keep the old value if
        // the new one is absent.
        if let Some(existing) = &self.solution {
            if info.build_vs_buy.is_none() {
                let prior = existing.build_vs_buy.clone();
                self.solution = Some(SolutionInfo { build_vs_buy: prior, ..info });
                return;
            }
        }
        self.solution = Some(info);
    }

    pub fn set_risk(&mut self, dimension: RiskDimension, assessment: RiskAssessment) {
        self.risks.insert(dimension, assessment);
    }

    pub fn risk(&self, dimension: RiskDimension) -> Option<&RiskAssessment> {
        self.risks.get(&dimension)
    }

    pub fn set_validation_plan(&mut self, plan: ValidationPlan) {
        self.validation_plan = Some(plan);
    }

    pub fn set_go_no_go(&mut self, call: GoNoGoCall) {
        self.go_no_go = Some(call);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stakeholder_ids_are_sequential() {
        let mut s = FindingSkeleton::new();
        let s1 = s.add_stakeholder("Dana", StakeholderRole::DecisionAuthority, false, "");
        let s2 = s.add_stakeholder("Ops team", StakeholderRole::PainHolder, true, "daily pain");
        assert_eq!(s1, "S1");
        assert_eq!(s2, "S2");
        assert_eq!(s.stakeholder_count(), 2);
    }

    #[test]
    fn metrics_update_is_partial() {
        let mut s = FindingSkeleton::new();
        s.update_success_metrics(Some("weekly active analysts".into()), None, None);
        s.update_success_metrics(None, Some("quarterly churn".into()), None);
        assert_eq!(s.success_metrics.leading.as_deref(), Some("weekly active analysts"));
        assert_eq!(s.success_metrics.lagging.as_deref(), Some("quarterly churn"));
        assert!(s.success_metrics.anti_metric.is_none());
        assert!(s.success_metrics.any_set());
    }

    #[test]
    fn criteria_split_by_kind() {
        let mut s = FindingSkeleton::new();
        s.add_decision_criterion(CriterionKind::ProceedIf, "pilot hits 20% adoption");
        s.add_decision_criterion(CriterionKind::DoNotProceedIf, "legal blocks data use");
        assert_eq!(s.decision_criteria.proceed_if.len(), 1);
        assert_eq!(s.decision_criteria.do_not_proceed_if.len(), 1);
    }

    #[test]
    fn risk_map_holds_one_entry_per_dimension() {
        let mut s = FindingSkeleton::new();
        s.set_risk(
            RiskDimension::Value,
            RiskAssessment {
                level: RiskLevel::High,
                summary: "unproven demand".into(),
                evidence_for: vec![],
                evidence_against: vec!["no waitlist signups".into()],
            },
        );
        s.set_risk(
            RiskDimension::Value,
            RiskAssessment {
                level: RiskLevel::Medium,
                summary: "pilot interest confirmed".into(),
                evidence_for: vec!["3 teams asked".into()],
                evidence_against: vec![],
            },
        );
        let v = s.risk(RiskDimension::Value).unwrap();
        assert_eq!(v.level, RiskLevel::Medium);
        assert!(s.risk(RiskDimension::Usability).is_none());
    }

    #[test]
    fn solution_info_keeps_build_vs_buy_on_partial_update() {
        let mut s = FindingSkeleton::new();
        s.set_solution_info(SolutionInfo {
            name: "Auto-triage".into(),
            description: "classify inbound tickets".into(),
            build_vs_buy: Some("buy: two vendors cover this".into()),
        });
        s.set_solution_info(SolutionInfo {
            name: "Auto-triage v2".into(),
            description: "classify and route".into(),
            build_vs_buy: None,
        });
        let sol = s.solution.as_ref().unwrap();
        assert_eq!(sol.name, "Auto-triage v2");
        assert_eq!(sol.build_vs_buy.as_deref(), Some("buy: two vendors cover this"));
    }

    #[test]
    fn skeleton_serde_roundtrip() {
        let mut s = FindingSkeleton::new();
        s.set_problem_statement("analysts wait days for data");
        s.add_stakeholder("Dana", StakeholderRole::DecisionAuthority, true, "sponsor");
        s.set_risk(
            RiskDimension::Feasibility,
            RiskAssessment {
                level: RiskLevel::Low,
                summary: "stack exists".into(),
                evidence_for: vec![],
                evidence_against: vec![],
            },
        );
        let json = serde_json::to_string(&s).unwrap();
        let back: FindingSkeleton = serde_json::from_str(&json).unwrap();
        assert_eq!(back.problem_statement.as_deref(), Some("analysts wait days for data"));
        assert_eq!(back.stakeholder_count(), 1);
        assert!(back.risk(RiskDimension::Feasibility).is_some());
    }
}
