//! # convoke-core
//!
//! Core types for the Convoke orchestration system.
//!
//! Convoke runs two kinds of model-driven work:
//!
//! - **Missions**: an architect role answers an objective, optionally
//!   delegating sub-tasks to specialist roles over a bounded number of turns.
//! - **Debates**: two experts alternate on a topic until their exchanges stop
//!   producing new content, then a synthesis is extracted.
//!
//! This crate holds everything the other crates share: the error taxonomy,
//! configuration, the data model, and the term-frequency similarity engine
//! used for debate convergence and related-debate search.

pub mod config;
mod error;
pub mod fail_open;
pub mod similarity;
pub mod text;
mod types;

pub use config::ConvokeConfig;
pub use error::{CompletionError, ConvokeError, Result};
pub use fail_open::{fail_open, ProgressSink};
pub use types::*;
