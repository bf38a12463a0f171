//! The assumption register — a dependency graph of claims.
//!
//! Every claim the conversation surfaces is registered here with an impact,
//! a confidence level, and a lifecycle status. Assumptions can depend on
//! one another; status changes propagate along the inverse edges
//! (`dependents`), which the register maintains automatically.
//!
//! Assumptions are never deleted, only superseded in status.

use std::collections::{BTreeMap, HashSet, VecDeque};

use assay_core::FactError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Invalidation cascades walk at most this many levels of dependents.
/// The graph is acyclic in practice, but the walk tolerates cycles via a
/// visited set and this bound.
pub const MAX_CASCADE_DEPTH: usize = 8;

/// What kind of claim an assumption is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Value,
    Technical,
    StakeholderDependency,
    Market,
    Organizational,
}

/// How much it matters if the assumption is wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    /// If wrong, changes whether to pursue at all
    High,
    /// If wrong, changes the approach
    Medium,
    /// If wrong, refines details
    Low,
}

/// How well-grounded the claim currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Validated,
    Informed,
    Guessed,
}

/// Lifecycle status of an assumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Active,
    AtRisk,
    Invalidated,
    Confirmed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::AtRisk => "at_risk",
            Self::Invalidated => "invalidated",
            Self::Confirmed => "confirmed",
        }
    }
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validated => "validated",
            Self::Informed => "informed",
            Self::Guessed => "guessed",
        }
    }
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Technical => "technical",
            Self::StakeholderDependency => "stakeholder_dependency",
            Self::Market => "market",
            Self::Organizational => "organizational",
        }
    }
}

/// A registered assumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assumption {
    /// Register-assigned id ("A1", "A2", ...)
    pub id: String,

    /// The specific claim being made
    pub claim: String,

    pub category: Category,
    pub impact: Impact,
    pub confidence: Confidence,
    pub status: Status,

    /// Where this assumption came from. Cascade notes append here.
    pub basis: String,

    /// Which guidance unit surfaced it
    pub surfaced_by: String,

    /// Ids of assumptions this one depends on
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Inverse edges, maintained by the register
    #[serde(default)]
    pub dependents: Vec<String>,

    #[serde(default)]
    pub recommended_action: String,

    #[serde(default)]
    pub implied_stakeholders: Vec<String>,

    pub created_turn: u32,
    pub last_updated_turn: u32,
}

/// Input for registering a new assumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssumptionDraft {
    pub claim: String,
    pub category: Category,
    pub impact: Impact,
    pub confidence: Confidence,
    pub basis: String,
    pub surfaced_by: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub recommended_action: String,
    #[serde(default)]
    pub implied_stakeholders: Vec<String>,
}

/// One node touched by a cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeChange {
    pub id: String,
    pub effect: String,
}

/// The outcome of a status update, including everything the cascade touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeReport {
    pub origin: String,
    pub new_status: Status,
    /// True when the update was a repeat of the current status (no-op).
    pub noop: bool,
    pub changes: Vec<CascadeChange>,
}

impl CascadeReport {
    /// Human-readable summary, fed back on the tool-result channel.
    pub fn summary(&self) -> String {
        self.summary_with_reason("")
    }

    /// Summary including the caller's reason text.
    pub fn summary_with_reason(&self, reason: &str) -> String {
        if self.noop {
            return format!(
                "{} already has status {}; nothing changed",
                self.origin,
                self.new_status.as_str()
            );
        }
        let mut out = format!("Updated {} status to {}", self.origin, self.new_status.as_str());
        if !reason.is_empty() {
            out.push_str(&format!(": {reason}"));
        }
        if !self.changes.is_empty() {
            let parts: Vec<String> = self
                .changes
                .iter()
                .map(|c| format!("{} {}", c.id, c.effect))
                .collect();
            out.push_str(&format!("\nCascade: {}", parts.join("; ")));
        }
        out
    }
}

/// Filters for querying the register. `None` means "don't filter".
#[derive(Debug, Clone, Default)]
pub struct AssumptionFilter {
    pub status: Option<Status>,
    pub impact: Option<Impact>,
    pub category: Option<Category>,
}

/// The assumption register. Single-writer within a conversation: all
/// mutation goes through `&mut self` so the cascade always sees a
/// consistent snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssumptionRegister {
    items: BTreeMap<String, Assumption>,
    counter: u32,
}

impl AssumptionRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new assumption and wire up the dependency graph.
    ///
    /// Dependencies naming unknown ids are kept on the new node (they may
    /// be registered later in the same turn) but get no inverse edge.
    pub fn register(&mut self, draft: AssumptionDraft, turn: u32) -> String {
        self.counter += 1;
        let id = format!("A{}", self.counter);

        for dep_id in &draft.depends_on {
            if let Some(dep) = self.items.get_mut(dep_id) {
                if !dep.dependents.contains(&id) {
                    dep.dependents.push(id.clone());
                }
            }
        }

        let assumption = Assumption {
            id: id.clone(),
            claim: draft.claim,
            category: draft.category,
            impact: draft.impact,
            confidence: draft.confidence,
            status: Status::Active,
            basis: draft.basis,
            surfaced_by: draft.surfaced_by,
            depends_on: draft.depends_on,
            dependents: Vec::new(),
            recommended_action: draft.recommended_action,
            implied_stakeholders: draft.implied_stakeholders,
            created_turn: turn,
            last_updated_turn: turn,
        };

        debug!(id = %id, "registered assumption");
        self.items.insert(id.clone(), assumption);
        id
    }

    /// Update an assumption's status, cascading to dependents.
    ///
    /// Invalidation walks the dependents graph breadth-first up to
    /// [`MAX_CASCADE_DEPTH`], flagging each currently-active node at-risk
    /// exactly once and recording a cascade note in its basis.
    /// Confirmation upgrades direct dependents from guessed to informed.
    /// Re-applying the current status is a no-op.
    pub fn update_status(
        &mut self,
        id: &str,
        new_status: Status,
        reason: &str,
        turn: u32,
    ) -> Result<CascadeReport, FactError> {
        let current = self
            .items
            .get(id)
            .ok_or_else(|| FactError::NotFound(id.to_string()))?;

        if current.status == new_status {
            return Ok(CascadeReport {
                origin: id.to_string(),
                new_status,
                noop: true,
                changes: Vec::new(),
            });
        }

        let direct_dependents = current.dependents.clone();

        {
            let node = self.items.get_mut(id).expect("checked above");
            node.status = new_status;
            node.last_updated_turn = turn;
        }

        let changes = match new_status {
            Status::Invalidated => self.cascade_invalidation(id, reason, turn),
            Status::Confirmed => self.cascade_confirmation(&direct_dependents, turn),
            _ => Vec::new(),
        };

        Ok(CascadeReport {
            origin: id.to_string(),
            new_status,
            noop: false,
            changes,
        })
    }

    /// Update an assumption's confidence.
    pub fn update_confidence(
        &mut self,
        id: &str,
        new_confidence: Confidence,
        turn: u32,
    ) -> Result<(), FactError> {
        let node = self
            .items
            .get_mut(id)
            .ok_or_else(|| FactError::NotFound(id.to_string()))?;
        node.confidence = new_confidence;
        node.last_updated_turn = turn;
        Ok(())
    }

    /// Query assumptions matching all given filters, in id order.
    pub fn query(&self, filter: &AssumptionFilter) -> Vec<&Assumption> {
        self.items
            .values()
            .filter(|a| filter.status.map_or(true, |s| a.status == s))
            .filter(|a| filter.impact.map_or(true, |i| a.impact == i))
            .filter(|a| filter.category.map_or(true, |c| a.category == c))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Assumption> {
        self.items.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Assumption> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Breadth-first walk of dependents, flagging active nodes at-risk.
    fn cascade_invalidation(&mut self, origin: &str, reason: &str, turn: u32) -> Vec<CascadeChange> {
        let mut changes = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(origin.to_string());

        // Queue entries: (node id, the upstream id that led here, depth)
        let mut queue: VecDeque<(String, String, usize)> = VecDeque::new();
        if let Some(node) = self.items.get(origin) {
            for dep in &node.dependents {
                queue.push_back((dep.clone(), origin.to_string(), 1));
            }
        }

        while let Some((id, via, depth)) = queue.pop_front() {
            if depth > MAX_CASCADE_DEPTH || !visited.insert(id.clone()) {
                continue;
            }

            let next_dependents = match self.items.get_mut(&id) {
                Some(node) => {
                    if node.status == Status::Active {
                        node.status = Status::AtRisk;
                        node.basis
                            .push_str(&format!("\nCascade: dependency {via} invalidated: {reason}"));
                        node.last_updated_turn = turn;
                        changes.push(CascadeChange {
                            id: id.clone(),
                            effect: "flagged at_risk".into(),
                        });
                    }
                    node.dependents.clone()
                }
                None => continue,
            };

            for dep in next_dependents {
                if !visited.contains(&dep) {
                    queue.push_back((dep, id.clone(), depth + 1));
                }
            }
        }

        changes
    }

    /// Confirming a node upgrades its direct dependents guessed → informed.
    fn cascade_confirmation(&mut self, direct_dependents: &[String], turn: u32) -> Vec<CascadeChange> {
        let mut changes = Vec::new();
        for dep_id in direct_dependents {
            if let Some(dep) = self.items.get_mut(dep_id) {
                if dep.confidence == Confidence::Guessed {
                    dep.confidence = Confidence::Informed;
                    dep.last_updated_turn = turn;
                    changes.push(CascadeChange {
                        id: dep_id.clone(),
                        effect: "confidence upgraded to informed".into(),
                    });
                }
            }
        }
        changes
    }
}
