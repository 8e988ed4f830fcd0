//! Convoke CLI - model-driven missions, expert panels and debates
//!
//! Usage:
//!   convoke init                    Write a default .convoke/config.toml
//!   convoke mission <objective>     Run an architect-led mission
//!   convoke adjudicate <query>      Convene an expert panel
//!   convoke status <trace_id>       Show a mission's outcome
//!   convoke trace <trace_id>        Show a mission's message log
//!   convoke list                    List recent missions
//!   convoke debate start <topic>    Run a two-expert debate
//!   convoke personas                List available agents

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use convoke_agent::{AgentRegistry, CommandCompletion, CompletionPort};
use convoke_core::text::truncate_chars;
use convoke_core::{
    AdjudicationResult, AdjudicationStrategy, AgentRole, ConvokeConfig, DebateResult,
    ExecutionMode, ExecutionTrace, MissionStatus, ProgressSink, SwarmResult, TaskStatus,
};
use convoke_debate::{DebateMemory, DebateOrchestrator, DebateRequest};
use convoke_orchestrator::SwarmOrchestrator;
use convoke_store::RecordStore;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// How often a detached mission is polled
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Characters of long text shown in listings
const EXCERPT_CHARS: usize = 200;

#[derive(Parser)]
#[command(name = "convoke")]
#[command(author, version, about = "Model-driven missions, expert panels and debates")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to .convoke/config.toml in the current directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Project root (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Run an architect-led mission
    Mission {
        /// What the mission should accomplish
        objective: String,

        /// Agent set to start with
        #[arg(short, long, value_enum, default_value = "fast")]
        preset: MissionPreset,

        /// Explicit agents, overriding the preset
        #[arg(short, long, value_delimiter = ',')]
        agents: Vec<String>,

        /// Additional context passed to every agent
        #[arg(long, default_value = "")]
        context: String,

        /// Run in the background and poll until it finishes (Ctrl-C cancels)
        #[arg(short, long)]
        detach: bool,
    },

    /// Convene an expert panel and reach a verdict
    Adjudicate {
        /// Question put to the panel
        query: String,

        /// Panel members (defaults to architect, analyst, reviewer)
        #[arg(short, long, value_delimiter = ',')]
        panel: Vec<String>,

        /// unanimous, majority or supreme_court
        #[arg(short, long, default_value = "supreme_court")]
        strategy: String,
    },

    /// Show a mission's outcome
    Status {
        /// Mission trace id
        trace_id: String,
    },

    /// Show a mission's full message log
    Trace {
        /// Mission trace id
        trace_id: String,
    },

    /// List recent missions
    List {
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Two-expert debates
    Debate {
        #[command(subcommand)]
        action: DebateCommands,
    },

    /// List built-in and custom agents
    Personas,
}

#[derive(Subcommand)]
enum DebateCommands {
    /// Run a debate
    Start {
        /// Debate topic
        topic: String,

        /// collaborative, adversarial, socratic or devil_advocate
        #[arg(short, long, default_value = "collaborative")]
        strategy: String,

        /// Round ceiling
        #[arg(long)]
        max_rounds: Option<usize>,

        /// Rounds run before convergence is considered
        #[arg(long)]
        min_rounds: Option<usize>,

        /// Additional context shown to both experts
        #[arg(long, default_value = "")]
        context: String,
    },

    /// Show a stored debate
    Load {
        /// Debate id
        id: String,
    },

    /// Find stored debates related to a topic
    Search {
        topic: String,

        #[arg(short = 'n', long, default_value = "5")]
        limit: usize,
    },

    /// Aggregate figures over stored debates
    Stats,

    /// Show the related-debate summary an expert would see for a topic
    Context {
        topic: String,
    },

    /// List stored debates
    List {
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

/// Starting agent sets for a mission
#[derive(Debug, Clone, Copy, ValueEnum)]
enum MissionPreset {
    /// Architect alone
    Fast,
    /// Architect, coder and reviewer
    Thorough,
    /// Architect, analyst and reviewer
    Consensus,
}

impl MissionPreset {
    fn roles(self) -> Vec<AgentRole> {
        match self {
            Self::Fast => vec![AgentRole::Architect],
            Self::Thorough => vec![AgentRole::Architect, AgentRole::Coder, AgentRole::Reviewer],
            Self::Consensus => vec![AgentRole::Architect, AgentRole::Analyst, AgentRole::Reviewer],
        }
    }
}

/// Progress updates go to the log
struct LogProgress;

#[async_trait]
impl ProgressSink for LogProgress {
    async fn report(&self, fraction: f32, message: &str) -> convoke_core::Result<()> {
        info!("[{:>3.0}%] {}", fraction * 100.0, message);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        config.logging.level.parse().unwrap_or(Level::INFO)
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init { path } => cmd_init(&path),
        command => App::new(config, cli.json)?.run(command).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<ConvokeConfig> {
    match path {
        Some(path) => ConvokeConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => {
            let root = std::env::current_dir()?;
            Ok(ConvokeConfig::load_or_default(&root)?)
        }
    }
}

fn cmd_init(path: &Path) -> Result<()> {
    let written = ConvokeConfig::write_default(path)?;
    println!("Wrote default configuration to {}", written.display());
    Ok(())
}

struct App {
    config: Arc<ConvokeConfig>,
    port: Arc<dyn CompletionPort>,
    registry: Arc<AgentRegistry>,
    json: bool,
}

impl App {
    fn new(config: ConvokeConfig, json: bool) -> Result<Self> {
        let port = CommandCompletion::new(
            config.completion.program.clone(),
            config.completion.args.clone(),
            config.models.default.clone(),
        )
        .with_default_timeout(config.activity_timeout());

        let mut registry = AgentRegistry::new();
        let personas_dir = config
            .personas_dir
            .clone()
            .unwrap_or_else(|| config.storage.data_dir.join("personas"));
        let loaded = registry
            .load_personas_from_dir(&personas_dir)
            .with_context(|| format!("Failed to load personas from {}", personas_dir.display()))?;
        if loaded > 0 {
            info!("Loaded {} custom personas from {}", loaded, personas_dir.display());
        }

        Ok(Self {
            config: Arc::new(config),
            port: Arc::new(port),
            registry: Arc::new(registry),
            json,
        })
    }

    fn missions(&self) -> SwarmOrchestrator {
        let traces = Arc::new(RecordStore::open(
            self.config.traces_dir(),
            self.config.storage.max_records,
            self.config.lock_timeout(),
        ));
        SwarmOrchestrator::new(
            self.port.clone(),
            self.registry.clone(),
            traces,
            self.config.clone(),
        )
        .with_progress(Arc::new(LogProgress))
    }

    fn debates(&self) -> DebateOrchestrator {
        DebateOrchestrator::new(
            self.port.clone(),
            Arc::new(DebateMemory::open(&self.config)),
            self.config.clone(),
        )
        .with_progress(Arc::new(LogProgress))
    }

    /// Print `value` as JSON when requested, otherwise with `human`
    fn emit<T: Serialize + ?Sized>(&self, value: &T, human: impl FnOnce(&T)) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human(value);
        }
        Ok(())
    }

    async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Init { path } => cmd_init(&path),
            Commands::Mission {
                objective,
                preset,
                agents,
                context,
                detach,
            } => self.cmd_mission(&objective, preset, &agents, &context, detach).await,
            Commands::Adjudicate {
                query,
                panel,
                strategy,
            } => self.cmd_adjudicate(&query, &panel, &strategy).await,
            Commands::Status { trace_id } => self.cmd_status(&trace_id).await,
            Commands::Trace { trace_id } => self.cmd_trace(&trace_id).await,
            Commands::List { limit } => self.cmd_list(limit).await,
            Commands::Debate { action } => self.cmd_debate(action).await,
            Commands::Personas => self.cmd_personas(),
        }
    }

    fn resolve_roles(&self, names: &[String]) -> Result<Vec<AgentRole>> {
        names
            .iter()
            .map(|name| {
                self.registry
                    .resolve(name.trim())
                    .map(|agent| agent.role.clone())
                    .with_context(|| format!("Unknown agent: {}", name))
            })
            .collect()
    }

    async fn cmd_mission(
        &self,
        objective: &str,
        preset: MissionPreset,
        agents: &[String],
        context: &str,
        detach: bool,
    ) -> Result<()> {
        let roles = if agents.is_empty() {
            preset.roles()
        } else {
            self.resolve_roles(agents)?
        };
        let missions = self.missions();

        if !detach {
            let result = missions
                .execute_mission(objective, ExecutionMode::Sync, &roles, context)
                .await?;
            self.emit(&result, print_swarm_result)?;
            if result.status == TaskStatus::Failed {
                bail!("Mission {} failed", result.trace_id);
            }
            return Ok(());
        }

        let started = missions
            .execute_mission(objective, ExecutionMode::Async, &roles, context)
            .await?;
        eprintln!(
            "Mission {} started in background (Ctrl-C to cancel)",
            started.trace_id
        );

        let status = wait_for_mission(&missions, &started.trace_id).await?;
        self.emit(&status, |status| print_status(&started.trace_id, status))?;
        if matches!(
            status,
            MissionStatus::Finished {
                status: TaskStatus::Failed,
                ..
            }
        ) {
            bail!("Mission {} failed", started.trace_id);
        }
        Ok(())
    }

    async fn cmd_adjudicate(&self, query: &str, panel: &[String], strategy: &str) -> Result<()> {
        let strategy = AdjudicationStrategy::parse(strategy)?;
        let panel: Vec<String> = panel.iter().map(|p| p.trim().to_string()).collect();
        let result = self.missions().adjudicate(query, &panel, strategy).await?;
        self.emit(&result, print_adjudication)
    }

    async fn cmd_status(&self, trace_id: &str) -> Result<()> {
        let status = self
            .missions()
            .get_status(trace_id)
            .await?
            .with_context(|| format!("No mission found with id {}", trace_id))?;
        self.emit(&status, |status| print_status(trace_id, status))
    }

    async fn cmd_trace(&self, trace_id: &str) -> Result<()> {
        let trace = self
            .missions()
            .get_trace(trace_id)
            .await?
            .with_context(|| format!("No trace found with id {}", trace_id))?;
        self.emit(&trace, print_trace)
    }

    async fn cmd_list(&self, limit: usize) -> Result<()> {
        let traces = self.missions().list_recent(limit).await?;
        self.emit(&traces, |traces| {
            if traces.is_empty() {
                println!("No missions found");
                return;
            }
            for trace in traces {
                println!(
                    "{}  {:<11} {}  {}",
                    trace.trace_id,
                    trace.status.to_string(),
                    trace.created_at.format("%Y-%m-%d %H:%M"),
                    excerpt(&trace.objective)
                );
            }
        })
    }

    async fn cmd_debate(&self, action: DebateCommands) -> Result<()> {
        let debates = self.debates();
        match action {
            DebateCommands::Start {
                topic,
                strategy,
                max_rounds,
                min_rounds,
                context,
            } => {
                let mut request = DebateRequest::new(topic)
                    .with_strategy(strategy)
                    .with_context(context);
                request.max_rounds = max_rounds;
                request.min_rounds = min_rounds;

                let result = debates.start_debate(request).await?;
                self.emit(&result, print_debate)
            }
            DebateCommands::Load { id } => {
                let result = debates
                    .load_debate(&id)
                    .await?
                    .with_context(|| format!("No debate found with id {}", id))?;
                self.emit(&result, print_debate)
            }
            DebateCommands::Search { topic, limit } => {
                let related = debates.find_related_debates(&topic, limit).await?;
                self.emit(&related, |related| {
                    if related.is_empty() {
                        println!("No related debates");
                    }
                    for r in related {
                        println!("{}  {:.2}  {}", r.debate_id, r.relevance, r.topic);
                        for insight in &r.key_insights {
                            println!("    - {}", insight);
                        }
                    }
                })
            }
            DebateCommands::Stats => {
                let stats = debates.debate_statistics().await?;
                self.emit(&stats, |stats| {
                    println!("Debates:          {}", stats.total_debates);
                    println!("Insights:         {}", stats.total_insights);
                    println!("Convergence rate: {:.0}%", stats.convergence_rate * 100.0);
                })
            }
            DebateCommands::Context { topic } => {
                let summary = debates.context_summary(&topic).await?;
                self.emit(&summary, |summary| match summary {
                    Some(summary) => println!("{}", summary),
                    None => println!("No related debates"),
                })
            }
            DebateCommands::List { limit } => {
                let records = debates.list_debates(limit).await?;
                self.emit(&records, |records| {
                    if records.is_empty() {
                        println!("No debates found");
                    }
                    for r in records {
                        println!(
                            "{}  {:<14} {} rounds{}  {}",
                            r.debate_id,
                            r.strategy.to_string(),
                            r.rounds_completed,
                            if r.converged { ", converged" } else { "" },
                            excerpt(&r.topic)
                        );
                    }
                })
            }
        }
    }

    fn cmd_personas(&self) -> Result<()> {
        let agents: Vec<_> = self.registry.all().collect();
        self.emit(&agents, |agents| {
            for agent in agents {
                let origin = if agent.role.is_custom() { " (custom)" } else { "" };
                println!("{:<14} {}{}", agent.slug(), agent.name, origin);
                if !agent.description.is_empty() {
                    println!("    {}", agent.description);
                }
            }
        })
    }
}

/// Poll a detached mission until it reaches a terminal state
///
/// Ctrl-C requests cooperative cancellation; polling continues until the
/// mission loop has finalized the trace.
async fn wait_for_mission(missions: &SwarmOrchestrator, trace_id: &str) -> Result<MissionStatus> {
    let mut shown: HashSet<(String, String)> = HashSet::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                if missions.cancel(trace_id) {
                    eprintln!("Cancelling mission {} after the current call...", trace_id);
                }
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }

        for (role, text) in missions.partial_results(trace_id) {
            if !shown.contains(&(role.clone(), text.clone())) {
                eprintln!("  [{}] {}", role, excerpt(&text));
                shown.insert((role, text));
            }
        }

        match missions.get_status(trace_id).await? {
            Some(MissionStatus::Running { .. }) => {}
            // Cancelled but not yet finalized
            Some(MissionStatus::Finished { .. }) if missions.running().get(trace_id).is_some() => {}
            Some(status) => return Ok(status),
            None => bail!("Mission {} is no longer tracked", trace_id),
        }
    }
}

fn excerpt(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    let cut = truncate_chars(first_line, EXCERPT_CHARS);
    if cut.len() < text.len() {
        format!("{}...", cut)
    } else {
        cut.to_string()
    }
}

fn join_roles(roles: &[AgentRole]) -> String {
    roles
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_swarm_result(result: &SwarmResult) {
    println!("Mission {}: {}", result.trace_id, result.status);
    println!("Agents: {}", join_roles(&result.agents_used));
    println!(
        "Turns: {}  Tasks: {}  Elapsed: {:.1}s",
        result.total_turns, result.tasks_completed, result.elapsed_seconds
    );
    if let Some(error) = &result.error {
        println!("Error: {}", error);
    }
    if let Some(text) = &result.result {
        println!("\n{}", text);
    }
}

fn print_status(trace_id: &str, status: &MissionStatus) {
    match status {
        MissionStatus::Running {
            objective,
            started_at,
        } => {
            println!("Mission {}: running since {}", trace_id, started_at.format("%H:%M:%S"));
            println!("Objective: {}", excerpt(objective));
        }
        MissionStatus::Finished {
            status,
            result,
            error,
        } => {
            println!("Mission {}: {}", trace_id, status);
            if let Some(error) = error {
                println!("Error: {}", error);
            }
            if let Some(result) = result {
                println!("\n{}", result);
            }
        }
    }
}

fn print_trace(trace: &ExecutionTrace) {
    println!("Mission {}: {}", trace.trace_id, trace.status);
    println!("Objective: {}", trace.objective);
    println!("Agents: {}", join_roles(&trace.agents_used));
    println!("Turns: {}", trace.total_turns);
    for message in &trace.messages {
        let speaker = message
            .agent
            .as_ref()
            .map(|a| a.to_string())
            .unwrap_or_else(|| format!("{:?}", message.role).to_lowercase());
        println!(
            "\n[{}] {}\n{}",
            speaker,
            message.timestamp.format("%H:%M:%S"),
            message.content
        );
    }
    if let Some(error) = &trace.error {
        println!("\nError: {}", error);
    }
}

fn print_adjudication(result: &AdjudicationResult) {
    println!("Verdict ({:.0}% confidence):", result.confidence * 100.0);
    println!("{}", result.verdict);
    if !result.reasoning.is_empty() {
        println!("\nReasoning: {}", result.reasoning);
    }

    println!("\nPanel:");
    for vote in &result.panel_votes {
        println!("  {} ({:.2}): {}", vote.agent, vote.confidence, excerpt(&vote.position));
        for concern in &vote.concerns {
            println!("      concern: {}", concern);
        }
    }

    if !result.dissenting_opinions.is_empty() {
        println!("\nDissent:");
        for dissent in &result.dissenting_opinions {
            println!("  - {}", dissent);
        }
    }
}

fn print_debate(result: &DebateResult) {
    println!(
        "Debate {} ({}): {}",
        result.debate_id, result.strategy, result.topic
    );
    let novelty: Vec<_> = result
        .rounds
        .iter()
        .map(|r| format!("{:.2}", r.novelty))
        .collect();
    println!(
        "Rounds: {}{}  Novelty: [{}]",
        result.rounds_completed,
        if result.converged { " (converged)" } else { "" },
        novelty.join(", ")
    );
    println!("\n{}", result.synthesis);

    for (heading, items) in [
        ("Consensus", &result.consensus),
        ("Disagreements", &result.disagreements),
        ("Actions", &result.actions),
    ] {
        if !items.is_empty() {
            println!("\n{}:", heading);
            for item in items {
                println!("  - {}", item);
            }
        }
    }
}
