//! Core type definitions for Convoke orchestration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ConvokeError;

/// Generate a short record id: the first 8 hex characters of a v4 UUID
pub fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Agent role identifier
///
/// Built-in roles serialize as their lowercase type id; custom roles
/// serialize as their persona slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AgentRole {
    Architect,
    Researcher,
    Coder,
    Analyst,
    Reviewer,
    Tester,
    Documenter,
    Custom(String),
}

impl AgentRole {
    /// All built-in roles, architect first
    pub const BUILT_IN: [AgentRole; 7] = [
        Self::Architect,
        Self::Researcher,
        Self::Coder,
        Self::Analyst,
        Self::Reviewer,
        Self::Tester,
        Self::Documenter,
    ];

    /// Match a built-in type id, case-insensitively
    pub fn builtin(name: &str) -> Option<Self> {
        Self::BUILT_IN
            .iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Architect => "architect",
            Self::Researcher => "researcher",
            Self::Coder => "coder",
            Self::Analyst => "analyst",
            Self::Reviewer => "reviewer",
            Self::Tester => "tester",
            Self::Documenter => "documenter",
            Self::Custom(slug) => slug,
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(role) = Self::builtin(s) {
            return Ok(role);
        }
        if s.is_empty() {
            return Err("Empty agent role".to_string());
        }
        Ok(Self::Custom(s.to_string()))
    }
}

impl TryFrom<String> for AgentRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AgentRole> for String {
    fn from(role: AgentRole) -> Self {
        role.as_str().to_string()
    }
}

/// Mission lifecycle status
///
/// Transitions only move forward: pending, in_progress, then one terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" | "inprogress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }
}

/// Whether `execute_mission` blocks until the mission finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Sync,
    Async,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync => write!(f, "sync"),
            Self::Async => write!(f, "async"),
        }
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sync" => Ok(Self::Sync),
            "async" => Ok(Self::Async),
            _ => Err(format!("Invalid execution mode: {}", s)),
        }
    }
}

/// How an adjudication panel reaches a verdict
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjudicationStrategy {
    Unanimous,
    Majority,
    #[default]
    SupremeCourt,
}

impl AdjudicationStrategy {
    pub const NAMES: &'static str = "unanimous, majority, supreme_court";

    /// Instruction appended to the synthesis prompt
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::Unanimous => "Seek unanimous agreement. Note any holdouts.",
            Self::Majority => "Follow the majority opinion. Note the vote split.",
            Self::SupremeCourt => {
                "Write a majority opinion and note any dissenting opinions."
            }
        }
    }

    /// Parse a strategy name, reporting the valid names on failure
    pub fn parse(name: &str) -> crate::Result<Self> {
        name.parse().map_err(|_| ConvokeError::UnknownStrategy {
            name: name.to_string(),
            valid: Self::NAMES.to_string(),
        })
    }
}

impl std::fmt::Display for AdjudicationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unanimous => write!(f, "unanimous"),
            Self::Majority => write!(f, "majority"),
            Self::SupremeCourt => write!(f, "supreme_court"),
        }
    }
}

impl std::str::FromStr for AdjudicationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unanimous" => Ok(Self::Unanimous),
            "majority" => Ok(Self::Majority),
            "supreme_court" | "supreme-court" => Ok(Self::SupremeCourt),
            _ => Err(format!("Invalid adjudication strategy: {}", s)),
        }
    }
}

/// Interaction style for a two-expert debate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateStrategy {
    #[default]
    Collaborative,
    Adversarial,
    Socratic,
    DevilAdvocate,
}

impl DebateStrategy {
    pub const NAMES: &'static str = "collaborative, adversarial, socratic, devil_advocate";

    /// Instruction shown to both experts every round
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::Collaborative => "Work together to find the best solution.",
            Self::Adversarial => "Challenge each other's positions rigorously.",
            Self::Socratic => "Use questions to explore the topic deeply.",
            Self::DevilAdvocate => "One expert should challenge assumptions.",
        }
    }

    /// Parse a strategy name, reporting the valid names on failure
    pub fn parse(name: &str) -> crate::Result<Self> {
        name.parse().map_err(|_| ConvokeError::UnknownStrategy {
            name: name.to_string(),
            valid: Self::NAMES.to_string(),
        })
    }
}

impl std::fmt::Display for DebateStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Collaborative => write!(f, "collaborative"),
            Self::Adversarial => write!(f, "adversarial"),
            Self::Socratic => write!(f, "socratic"),
            Self::DevilAdvocate => write!(f, "devil_advocate"),
        }
    }
}

impl std::str::FromStr for DebateStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "collaborative" => Ok(Self::Collaborative),
            "adversarial" => Ok(Self::Adversarial),
            "socratic" => Ok(Self::Socratic),
            "devil_advocate" => Ok(Self::DevilAdvocate),
            _ => Err(format!("Invalid debate strategy: {}", s)),
        }
    }
}

/// Who produced a trace message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// One entry in a mission trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmMessage {
    pub role: MessageRole,
    pub content: String,
    /// Agent that produced the content, if any
    pub agent: Option<AgentRole>,
    pub timestamp: DateTime<Utc>,
}

impl SwarmMessage {
    pub fn from_agent(agent: AgentRole, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            agent: Some(agent),
            timestamp: Utc::now(),
        }
    }
}

/// Full history of one mission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub trace_id: String,
    pub objective: String,
    pub status: TaskStatus,
    /// Roles requested or delegated to, in first-use order
    pub agents_used: Vec<AgentRole>,
    pub messages: Vec<SwarmMessage>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub total_turns: usize,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionTrace {
    pub fn new(objective: impl Into<String>, agents: Vec<AgentRole>) -> Self {
        let mut trace = Self {
            trace_id: short_id(),
            objective: objective.into(),
            status: TaskStatus::Pending,
            agents_used: Vec::new(),
            messages: Vec::new(),
            result: None,
            error: None,
            total_turns: 0,
            created_at: Utc::now(),
            completed_at: None,
        };
        for agent in agents {
            trace.note_agent(agent);
        }
        trace
    }

    /// Record a role as used, keeping first-use order without duplicates
    pub fn note_agent(&mut self, agent: AgentRole) {
        if !self.agents_used.contains(&agent) {
            self.agents_used.push(agent);
        }
    }

    /// Move to in_progress; ignored once the trace has moved past pending
    pub fn start(&mut self) {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::InProgress;
        }
    }

    /// Move to a terminal state
    ///
    /// Returns false, leaving the trace untouched, if it is already terminal.
    pub fn finish(
        &mut self,
        status: TaskStatus,
        result: Option<String>,
        error: Option<String>,
    ) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.result = result;
        self.error = error;
        self.completed_at = Some(Utc::now());
        true
    }

    pub fn last_message(&self) -> Option<&str> {
        self.messages.last().map(|m| m.content.as_str())
    }
}

/// Outcome returned by `execute_mission`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmResult {
    pub trace_id: String,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub agents_used: Vec<AgentRole>,
    pub tasks_completed: usize,
    pub total_turns: usize,
    pub elapsed_seconds: f64,
}

/// One panel member's position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelVote {
    pub agent: AgentRole,
    pub position: String,
    pub reasoning: String,
    /// Always within [0, 1]
    pub confidence: f64,
    #[serde(default)]
    pub concerns: Vec<String>,
}

/// Aggregated verdict of an adjudication panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjudicationResult {
    pub trace_id: String,
    pub query: String,
    pub verdict: String,
    pub reasoning: String,
    pub confidence: f64,
    pub panel_votes: Vec<PanelVote>,
    pub dissenting_opinions: Vec<String>,
    pub elapsed_seconds: f64,
}

/// One exchange between the two debate experts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateRound {
    pub round_number: usize,
    pub expert_a: String,
    pub expert_b: String,
    /// 1.0 for the first round, otherwise 1 - similarity to the prior rounds
    pub novelty: f64,
}

/// Outcome of a debate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateResult {
    pub debate_id: String,
    pub topic: String,
    pub strategy: DebateStrategy,
    /// Transcript; empty for records persisted without one
    pub rounds: Vec<DebateRound>,
    /// Rounds actually run, kept even when the transcript is absent
    pub rounds_completed: usize,
    pub synthesis: String,
    pub consensus: Vec<String>,
    pub disagreements: Vec<String>,
    pub actions: Vec<String>,
    /// True when the debate stopped before exhausting its round ceiling
    pub converged: bool,
    pub elapsed_seconds: f64,
}

/// A prior debate relevant to a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedDebate {
    pub debate_id: String,
    pub topic: String,
    pub relevance: f64,
    pub key_insights: Vec<String>,
}

/// Aggregate figures over stored debates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebateStatistics {
    pub total_debates: usize,
    pub total_insights: usize,
    pub convergence_rate: f64,
}

/// Run state of a registered mission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Cancelled,
}

/// Entry in the running-mission registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningMission {
    pub trace_id: String,
    pub objective: String,
    pub started_at: DateTime<Utc>,
    pub state: RunState,
}

/// Answer to `get_status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MissionStatus {
    Running {
        objective: String,
        started_at: DateTime<Utc>,
    },
    Finished {
        status: TaskStatus,
        result: Option<String>,
        error: Option<String>,
    },
}
