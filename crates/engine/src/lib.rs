//! # Assay Engine
//!
//! Turn orchestration and context retrieval: for every incoming message,
//! decide what to do next (router), assemble exactly the context the
//! action phase needs (assembler), drive the tool-call loop that mutates
//! the fact store (executor), and keep the per-conversation state
//! lifecycle honest (orchestrator).

pub mod assembler;
pub mod command;
pub mod executor;
pub mod orchestrator;
pub mod prompts;
pub mod router;

pub use assembler::{ContextBundle, RetrievalAssembler};
pub use command::{apply, definitions, Command, CommandOutcome};
pub use executor::{ExecutorOptions, TurnExecutor, TurnOutcome};
pub use orchestrator::{fallback_summary, Orchestrator, PRIMING_MESSAGE};
pub use router::{apply_transition, parse_decision, NextAction, RoutingDecision, TurnRouter};
