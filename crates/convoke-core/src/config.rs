//! Configuration management for Convoke
//!
//! Settings for model selection, time budgets, mission and debate limits,
//! storage locations and the external completion command. Loaded from
//! `.convoke/config.toml` (or an explicit path) and validated on load.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{ConvokeError, Result};

/// Top-level Convoke configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvokeConfig {
    /// Model selection
    #[serde(default)]
    pub models: ModelConfig,

    /// Time budgets
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Mission orchestration limits
    #[serde(default)]
    pub swarm: SwarmConfig,

    /// Debate parameters
    #[serde(default)]
    pub debate: DebateConfig,

    /// Record persistence
    #[serde(default)]
    pub storage: StorageConfig,

    /// Input size limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// External completion command used by the CLI
    #[serde(default)]
    pub completion: CompletionCommandConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Directory holding custom persona documents
    #[serde(default)]
    pub personas_dir: Option<PathBuf>,
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Default model for architect, panel and Expert A calls
    #[serde(default = "default_model")]
    pub default: String,

    /// Faster model used by Expert B
    #[serde(default = "default_fast_model")]
    pub fast: String,
}

/// Time budgets, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Overall mission budget and per-call architect timeout
    #[serde(default = "default_activity_timeout")]
    pub activity_secs: u64,

    /// Per-call timeout for debate experts
    #[serde(default = "default_debate_turn_timeout")]
    pub debate_turn_secs: u64,

    /// Minimum per-call timeout granted to a delegated agent
    #[serde(default = "default_delegation_floor")]
    pub delegation_floor_secs: u64,
}

/// Mission orchestration limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// Delegations honored per turn; turn ceiling is `max_depth * 4`
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Hard ceiling on architect turns
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Maximum number of roles a mission may list
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,

    /// Panel members queried per adjudication
    #[serde(default = "default_max_panel_size")]
    pub max_panel_size: usize,

    /// Characters of each delegated result fed back to the architect
    #[serde(default = "default_result_digest_chars")]
    pub result_digest_chars: usize,
}

/// Debate parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateConfig {
    /// Ceiling for requested rounds
    #[serde(default = "default_debate_max_rounds")]
    pub max_rounds: usize,

    /// Rounds run when the caller does not ask for a number
    #[serde(default = "default_debate_rounds")]
    pub default_rounds: usize,

    /// Rounds that always run before convergence is considered
    #[serde(default = "default_debate_min_rounds")]
    pub min_rounds: usize,

    /// Novelty below which a debate is considered converged
    #[serde(default = "default_novelty_threshold")]
    pub novelty_threshold: f64,

    /// Prior responses shown to each expert
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Character budget for the related-debates summary
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,
}

/// Record persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for traces and debates
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Files kept per record namespace
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    /// Time to wait for a record lock before writing unlocked
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

/// Input size limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Context window of the completion service; inputs may use ~4 chars per token
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
}

/// External completion command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionCommandConfig {
    /// Program receiving the prompt on stdin
    #[serde(default = "default_completion_program")]
    pub program: String,

    /// Extra arguments
    #[serde(default)]
    pub args: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value providers
fn default_model() -> String {
    "gemini-3-pro-preview".to_string()
}

fn default_fast_model() -> String {
    "gemini-3-flash-preview".to_string()
}

fn default_activity_timeout() -> u64 {
    600
}

fn default_debate_turn_timeout() -> u64 {
    180
}

fn default_delegation_floor() -> u64 {
    10
}

fn default_max_depth() -> usize {
    3
}

fn default_max_turns() -> usize {
    10
}

fn default_max_agents() -> usize {
    10
}

fn default_max_panel_size() -> usize {
    10
}

fn default_result_digest_chars() -> usize {
    2000
}

fn default_debate_max_rounds() -> usize {
    10
}

fn default_debate_rounds() -> usize {
    5
}

fn default_debate_min_rounds() -> usize {
    3
}

fn default_novelty_threshold() -> f64 {
    0.2
}

fn default_history_window() -> usize {
    4
}

fn default_context_chars() -> usize {
    2000
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".convoke")
}

fn default_max_records() -> usize {
    500
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

fn default_max_context_tokens() -> usize {
    900_000
}

fn default_completion_program() -> String {
    "gemini".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl ConvokeConfig {
    /// Load configuration from `.convoke/config.toml` under `root`, or use defaults
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = root.join(".convoke/config.toml");

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from an explicit file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            ConvokeError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write default configuration to `.convoke/config.toml` under `root`
    pub fn write_default(root: &Path) -> Result<PathBuf> {
        let config_dir = root.join(".convoke");
        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| ConvokeError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }

    /// Check numeric bounds and enumerated values
    pub fn validate(&self) -> Result<()> {
        for (name, secs) in [
            ("timeouts.activity_secs", self.timeouts.activity_secs),
            ("timeouts.debate_turn_secs", self.timeouts.debate_turn_secs),
            ("timeouts.delegation_floor_secs", self.timeouts.delegation_floor_secs),
        ] {
            if secs < 1 {
                return Err(ConvokeError::Config(format!(
                    "{} must be >= 1 second, got {}",
                    name, secs
                )));
            }
        }

        if !(1..=20).contains(&self.swarm.max_depth) {
            return Err(ConvokeError::Config(format!(
                "swarm.max_depth must be 1-20, got {}",
                self.swarm.max_depth
            )));
        }

        if self.swarm.max_turns < 1 {
            return Err(ConvokeError::Config(
                "swarm.max_turns must be >= 1".to_string(),
            ));
        }

        if !(1..=50).contains(&self.swarm.max_agents) {
            return Err(ConvokeError::Config(format!(
                "swarm.max_agents must be 1-50, got {}",
                self.swarm.max_agents
            )));
        }

        if self.swarm.max_panel_size < 1 {
            return Err(ConvokeError::Config(
                "swarm.max_panel_size must be >= 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.debate.novelty_threshold) {
            return Err(ConvokeError::Config(format!(
                "debate.novelty_threshold must be 0.0-1.0, got {}",
                self.debate.novelty_threshold
            )));
        }

        if self.debate.max_rounds < 1 || self.debate.min_rounds < 1 {
            return Err(ConvokeError::Config(
                "debate rounds must be >= 1".to_string(),
            ));
        }

        if self.limits.max_context_tokens < 1000 {
            return Err(ConvokeError::Config(format!(
                "limits.max_context_tokens must be >= 1000, got {}",
                self.limits.max_context_tokens
            )));
        }

        if self.storage.max_records < 1 {
            return Err(ConvokeError::Config(
                "storage.max_records must be >= 1".to_string(),
            ));
        }

        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConvokeError::Config(format!(
                "logging.level must be one of {:?}, got {}",
                LOG_LEVELS, self.logging.level
            )));
        }

        Ok(())
    }

    /// Longest accepted topic, objective or context, in characters
    pub fn max_input_chars(&self) -> usize {
        self.limits.max_context_tokens * 4
    }

    /// Reject an input longer than [`Self::max_input_chars`]
    pub fn check_input(&self, field: &'static str, value: &str) -> Result<()> {
        let max = self.max_input_chars();
        let len = value.chars().count();
        if len > max {
            return Err(ConvokeError::InputTooLarge { field, len, max });
        }
        Ok(())
    }

    /// Directory holding persisted mission traces
    pub fn traces_dir(&self) -> PathBuf {
        self.storage.data_dir.join("swarm").join("traces")
    }

    /// Directory holding persisted debates
    pub fn debates_dir(&self) -> PathBuf {
        self.storage.data_dir.join("debates")
    }

    pub fn activity_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.activity_secs)
    }

    pub fn debate_turn_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.debate_turn_secs)
    }

    pub fn delegation_floor(&self) -> Duration {
        Duration::from_secs(self.timeouts.delegation_floor_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.storage.lock_timeout_ms)
    }

    /// Architect turns allowed per mission
    pub fn turn_ceiling(&self) -> usize {
        self.swarm.max_turns.min(self.swarm.max_depth * 4)
    }
}

impl Default for ConvokeConfig {
    fn default() -> Self {
        Self {
            models: ModelConfig::default(),
            timeouts: TimeoutConfig::default(),
            swarm: SwarmConfig::default(),
            debate: DebateConfig::default(),
            storage: StorageConfig::default(),
            limits: LimitsConfig::default(),
            completion: CompletionCommandConfig::default(),
            logging: LoggingConfig::default(),
            personas_dir: None,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default: default_model(),
            fast: default_fast_model(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            activity_secs: default_activity_timeout(),
            debate_turn_secs: default_debate_turn_timeout(),
            delegation_floor_secs: default_delegation_floor(),
        }
    }
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_turns: default_max_turns(),
            max_agents: default_max_agents(),
            max_panel_size: default_max_panel_size(),
            result_digest_chars: default_result_digest_chars(),
        }
    }
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_debate_max_rounds(),
            default_rounds: default_debate_rounds(),
            min_rounds: default_debate_min_rounds(),
            novelty_threshold: default_novelty_threshold(),
            history_window: default_history_window(),
            context_chars: default_context_chars(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_records: default_max_records(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: default_max_context_tokens(),
        }
    }
}

impl Default for CompletionCommandConfig {
    fn default() -> Self {
        Self {
            program: default_completion_program(),
            args: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
