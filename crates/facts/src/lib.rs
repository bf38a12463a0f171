//! # Assay Facts
//!
//! The fact store: an assumption dependency graph with status cascades, the
//! progressively-filled finding skeleton, per-conversation routing context,
//! and the session state object that owns them all.
//!
//! All mutators are idempotent-safe and synchronous within a turn. The
//! session is passed by mutable reference through the engine — single
//! writer per conversation, no locking, no globals.

pub mod artifact;
pub mod assumption;
pub mod routing;
pub mod session;
pub mod skeleton;

pub use artifact::{render, ArtifactKind, MissingFields};
pub use assumption::{
    Assumption, AssumptionDraft, AssumptionFilter, AssumptionRegister, CascadeChange,
    CascadeReport, Category, Confidence, Impact, Status, MAX_CASCADE_DEPTH,
};
pub use routing::{GuidanceFired, OrgContext, RoutingContext};
pub use session::{FileSummary, Mode, Phase, ProjectState, SessionState, StateSnapshot, SCHEMA_VERSION};
pub use skeleton::{
    CriterionKind, DecisionCriteria, FindingSkeleton, GoNoGo, GoNoGoCall, RiskAssessment,
    RiskDimension, RiskLevel, SolutionInfo, Stakeholder, StakeholderRole, SuccessMetrics,
    ValidationApproach, ValidationPlan,
};
