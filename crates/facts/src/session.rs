//! Per-conversation session state.
//!
//! One `SessionState` per conversation, owned by whoever drives the turn
//! loop and passed by mutable reference — never ambient, never global.
//! All within-turn mutation is serialized through `&mut self` (single
//! writer), which is what the dependency cascade relies on for a
//! consistent snapshot.

use assay_core::message::{ConversationId, Message, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::assumption::AssumptionRegister;
use crate::routing::{OrgContext, RoutingContext};
use crate::skeleton::FindingSkeleton;

/// Snapshot schema version, checked on restore.
pub const SCHEMA_VERSION: &str = "1.0";

/// The analysis modes a conversation can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Problem discovery: interrogate the problem before any solution
    Discovery,
    /// Solution evaluation: assess a named approach against the problem
    Evaluation,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Evaluation => "evaluation",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The per-conversation state machine. Only two states exist; nested or
/// concurrent modes are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Phase {
    Gathering,
    ModeActive { mode: Mode },
}

impl Default for Phase {
    fn default() -> Self {
        Self::Gathering
    }
}

/// Summary of an uploaded document, carried for prompt context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSummary {
    pub filename: String,
    pub summary: String,
}

/// Project-level context available to every turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectState {
    pub file_summaries: Vec<FileSummary>,
}

impl ProjectState {
    /// Render the always-on project context block.
    pub fn render(&self, org: &OrgContext) -> String {
        let mut parts = Vec::new();
        if !org.is_empty() {
            parts.push(org.render());
        }
        if !self.file_summaries.is_empty() {
            let mut docs = String::from("## Available Documents");
            for f in &self.file_summaries {
                docs.push_str(&format!("\n- **{}**: {}", f.filename, f.summary));
            }
            parts.push(docs);
        }
        if parts.is_empty() {
            "No project context available yet.".into()
        } else {
            parts.join("\n\n")
        }
    }
}

/// All state for one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub id: ConversationId,
    pub turn_count: u32,
    pub phase: Phase,
    pub register: AssumptionRegister,
    pub skeleton: FindingSkeleton,
    pub routing: RoutingContext,
    pub org: OrgContext,
    pub project: ProjectState,
    /// Full transcript, user/assistant pairs in order.
    pub messages: Vec<Message>,
    pub latest_artifact: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            id: ConversationId::new(),
            turn_count: 0,
            phase: Phase::Gathering,
            register: AssumptionRegister::new(),
            skeleton: FindingSkeleton::new(),
            routing: RoutingContext::default(),
            org: OrgContext::default(),
            project: ProjectState::default(),
            messages: Vec::new(),
            latest_artifact: None,
        }
    }

    pub fn active_mode(&self) -> Option<Mode> {
        match self.phase {
            Phase::Gathering => None,
            Phase::ModeActive { mode } => Some(mode),
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    /// The original problem statement (first user message), if any.
    pub fn original_input(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    /// The last `turns` user/assistant exchanges (2 messages per turn).
    pub fn recent_messages(&self, turns: usize) -> &[Message] {
        let take = turns * 2;
        let start = self.messages.len().saturating_sub(take);
        &self.messages[start..]
    }

    /// Enter a mode. Re-entering the active mode is a no-op.
    pub fn enter_mode(&mut self, mode: Mode) {
        if self.active_mode() == Some(mode) {
            return;
        }
        self.phase = Phase::ModeActive { mode };
        self.routing.mode_turn_count = 0;
        if mode == Mode::Discovery {
            self.routing.critical_mass_reached = true;
        }
    }

    /// Complete the active mode: clears the active sub-goal fields and
    /// returns to gathering. The assumption graph, skeleton, and routing
    /// history are preserved.
    pub fn complete_mode(&mut self) {
        self.phase = Phase::Gathering;
        self.routing.mode_turn_count = 0;
        self.routing.active_probe.clear();
    }

    /// Serialize the full session for the persistence collaborator.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            schema_version: SCHEMA_VERSION.to_string(),
            saved_at: Utc::now(),
            state: self.clone(),
        }
    }

    /// Restore from a snapshot. A schema mismatch is tolerated with a
    /// warning; fields missing from older snapshots take their defaults
    /// through serde.
    pub fn restore(snapshot: StateSnapshot) -> Self {
        if snapshot.schema_version != SCHEMA_VERSION {
            warn!(
                saved = %snapshot.schema_version,
                current = SCHEMA_VERSION,
                "restoring snapshot with different schema version"
            );
        }
        snapshot.state
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// The serializable unit handed to the persistence boundary. The engine
/// does not decide file formats, directories, or save triggers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub schema_version: String,
    pub saved_at: DateTime<Utc>,
    pub state: SessionState,
}
