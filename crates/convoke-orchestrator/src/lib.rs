//! # convoke-orchestrator
//!
//! Architect-led mission orchestration for Convoke.
//!
//! This crate provides:
//! - The bounded mission loop (delegate / complete directives, turn and time budgets)
//! - Sync and detached async execution with cooperative cancellation
//! - Expert-panel adjudication
//! - The running-mission registry and a shared blackboard

mod adjudication;
mod blackboard;
mod mission;
mod prompt;
mod running;

pub use blackboard::{Blackboard, BlackboardEntry};
pub use mission::SwarmOrchestrator;
pub use prompt::{build_agent_prompt, build_architect_prompt, timed_out_placeholder};
pub use running::RunningRegistry;
