//! Persisted record layouts for mission traces and debates

use chrono::{DateTime, Utc};
use convoke_core::{
    AgentRole, DebateResult, DebateRound, DebateStrategy, ExecutionTrace, SwarmMessage, TaskStatus,
};
use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Stored form of a mission trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub trace_id: String,
    pub objective: String,
    pub status: TaskStatus,
    pub agents_used: Vec<AgentRole>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub total_turns: usize,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<SwarmMessage>,
}

impl Record for TraceRecord {
    fn record_id(&self) -> &str {
        &self.trace_id
    }
}

impl From<&ExecutionTrace> for TraceRecord {
    fn from(trace: &ExecutionTrace) -> Self {
        Self {
            trace_id: trace.trace_id.clone(),
            objective: trace.objective.clone(),
            status: trace.status,
            agents_used: trace.agents_used.clone(),
            result: trace.result.clone(),
            error: trace.error.clone(),
            total_turns: trace.total_turns,
            created_at: trace.created_at,
            completed_at: trace.completed_at,
            messages: trace.messages.clone(),
        }
    }
}

impl From<TraceRecord> for ExecutionTrace {
    fn from(record: TraceRecord) -> Self {
        Self {
            trace_id: record.trace_id,
            objective: record.objective,
            status: record.status,
            agents_used: record.agents_used,
            messages: record.messages,
            result: record.result,
            error: record.error,
            total_turns: record.total_turns,
            created_at: record.created_at,
            completed_at: record.completed_at,
        }
    }
}

/// Stored form of a finished debate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateRecord {
    pub debate_id: String,
    pub topic: String,
    pub strategy: DebateStrategy,
    pub rounds_completed: usize,
    pub synthesis: String,
    #[serde(default)]
    pub consensus: Vec<String>,
    #[serde(default)]
    pub disagreements: Vec<String>,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub converged: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rounds: Vec<DebateRound>,
}

impl Record for DebateRecord {
    fn record_id(&self) -> &str {
        &self.debate_id
    }
}

impl From<&DebateResult> for DebateRecord {
    fn from(result: &DebateResult) -> Self {
        Self {
            debate_id: result.debate_id.clone(),
            topic: result.topic.clone(),
            strategy: result.strategy,
            rounds_completed: result.rounds_completed,
            synthesis: result.synthesis.clone(),
            consensus: result.consensus.clone(),
            disagreements: result.disagreements.clone(),
            actions: result.actions.clone(),
            converged: result.converged,
            timestamp: Utc::now(),
            rounds: result.rounds.clone(),
        }
    }
}

impl From<DebateRecord> for DebateResult {
    fn from(record: DebateRecord) -> Self {
        Self {
            debate_id: record.debate_id,
            topic: record.topic,
            strategy: record.strategy,
            rounds: record.rounds,
            rounds_completed: record.rounds_completed,
            synthesis: record.synthesis,
            consensus: record.consensus,
            disagreements: record.disagreements,
            actions: record.actions,
            converged: record.converged,
            elapsed_seconds: 0.0,
        }
    }
}
