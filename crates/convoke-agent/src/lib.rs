//! # convoke-agent
//!
//! Everything between the orchestrators and the language model.
//!
//! - [`CompletionPort`]: the narrow seam to a completion service, with an
//!   external-command adapter and a scripted double for tests
//! - [`AgentRegistry`]: built-in roles plus custom personas loaded from
//!   markdown documents
//! - Directive scanning (`delegate(...)` / `complete(...)`) and defensive
//!   JSON extraction from free-form model output

pub mod actions;
mod command;
mod completion;
mod registry;
mod scripted;
pub mod structured;

pub use actions::{parse_actions, ArchitectActions, Delegation};
pub use command::CommandCompletion;
pub use completion::{Completion, CompletionPort, CompletionRequest, Usage};
pub use registry::{parse_persona, AgentDefinition, AgentRegistry};
pub use scripted::ScriptedCompletion;
pub use structured::parse_structured;
