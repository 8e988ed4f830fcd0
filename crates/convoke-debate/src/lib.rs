//! # convoke-debate
//!
//! Structured debates between two experts backed by different models.
//!
//! Each round both experts answer in turn, seeing the most recent exchanges.
//! A round's novelty is how little its text overlaps the previous rounds;
//! once novelty drops below the configured threshold (after the minimum
//! number of rounds) the debate is considered converged and a synthesis is
//! extracted. Finished debates are persisted and feed later debates on
//! related topics through [`DebateMemory`].

mod memory;
mod orchestrator;
mod prompt;

pub use memory::DebateMemory;
pub use orchestrator::{novelty, DebateOrchestrator, DebateRequest};
