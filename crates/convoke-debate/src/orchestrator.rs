//! Debate Orchestrator - alternating experts until the exchange goes stale

use convoke_agent::structured::{string_field, string_list_field};
use convoke_agent::{parse_structured, CompletionPort, CompletionRequest};
use convoke_core::fail_open::{fail_open, report_progress};
use convoke_core::similarity::{cosine, term_vector};
use convoke_core::{
    short_id, CompletionError, ConvokeConfig, DebateResult, DebateRound, DebateStatistics,
    DebateStrategy, ProgressSink, RelatedDebate, Result,
};
use convoke_store::DebateRecord;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

use crate::memory::DebateMemory;
use crate::prompt::{build_expert_prompt, build_synthesis_prompt, ExpertTurn};

const EXPERT_A: &str = "Expert A";
const EXPERT_B: &str = "Expert B";

const EXPERT_A_TEMPERATURE: f32 = 0.7;
const EXPERT_B_TEMPERATURE: f32 = 1.0;

/// Related debates summarized into each expert prompt
const RELATED_DEBATES: usize = 3;

/// Prior rounds compared against when scoring novelty
const NOVELTY_WINDOW: usize = 2;

/// Parameters for [`DebateOrchestrator::start_debate`]
#[derive(Debug, Clone)]
pub struct DebateRequest {
    pub topic: String,
    /// Strategy name, parsed strictly
    pub strategy: String,
    /// Round ceiling; the configured default when `None`
    pub max_rounds: Option<usize>,
    /// Rounds before convergence is considered; the configured minimum when `None`
    pub min_rounds: Option<usize>,
    pub context: String,
}

impl DebateRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            strategy: DebateStrategy::default().to_string(),
            max_rounds: None,
            min_rounds: None,
            context: String::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = strategy.into();
        self
    }

    pub fn with_max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = Some(rounds);
        self
    }

    pub fn with_min_rounds(mut self, rounds: usize) -> Self {
        self.min_rounds = Some(rounds);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// Novelty of a round relative to the rounds before it
///
/// 1.0 for the first round. Otherwise one minus the cosine similarity between
/// this round's text and the text of the last two rounds, clamped to `[0, 1]`.
pub fn novelty(expert_a: &str, expert_b: &str, previous: &[DebateRound]) -> f64 {
    if previous.is_empty() {
        return 1.0;
    }

    let current = term_vector(&format!("{} {}", expert_a, expert_b));
    let prior = previous[previous.len().saturating_sub(NOVELTY_WINDOW)..]
        .iter()
        .map(|r| format!("{} {}", r.expert_a, r.expert_b))
        .collect::<Vec<_>>()
        .join(" ");

    (1.0 - cosine(&current, &term_vector(&prior))).clamp(0.0, 1.0)
}

/// Runs debates and answers questions about past ones
pub struct DebateOrchestrator {
    port: Arc<dyn CompletionPort>,
    memory: Arc<DebateMemory>,
    config: Arc<ConvokeConfig>,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl DebateOrchestrator {
    pub fn new(
        port: Arc<dyn CompletionPort>,
        memory: Arc<DebateMemory>,
        config: Arc<ConvokeConfig>,
    ) -> Self {
        Self {
            port,
            memory,
            config,
            progress: None,
        }
    }

    /// Report progress to `sink`; sink failures are ignored
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn memory(&self) -> &DebateMemory {
        &self.memory
    }

    /// Run a debate to convergence or its round ceiling, then synthesize
    /// and persist it
    ///
    /// The strategy and input sizes are validated before any completion call.
    #[instrument(skip(self, request), fields(topic = %request.topic))]
    pub async fn start_debate(&self, request: DebateRequest) -> Result<DebateResult> {
        let strategy = DebateStrategy::parse(&request.strategy)?;
        self.config.check_input("topic", &request.topic)?;
        self.config.check_input("context", &request.context)?;

        let settings = &self.config.debate;
        let max_rounds = request
            .max_rounds
            .unwrap_or(settings.default_rounds)
            .clamp(1, settings.max_rounds.max(1));
        let min_rounds = request
            .min_rounds
            .unwrap_or(settings.min_rounds)
            .clamp(1, max_rounds);

        let debate_id = short_id();
        let started = Instant::now();
        info!(
            "Starting debate {} ({}, {}-{} rounds)",
            debate_id, strategy, min_rounds, max_rounds
        );

        let related = fail_open("related debate lookup", || {
            self.memory
                .context_summary(&request.topic, RELATED_DEBATES, settings.context_chars)
        })
        .await
        .flatten();

        let turn_timeout = self.config.debate_turn_timeout();
        let mut history: Vec<(&'static str, String)> = Vec::new();
        let mut rounds: Vec<DebateRound> = Vec::new();

        for round in 1..=max_rounds {
            report_progress(
                self.progress.as_deref(),
                round as f32 / (max_rounds + 1) as f32,
                &format!("Round {}...", round),
            )
            .await;

            let prompt = build_expert_prompt(&ExpertTurn {
                expert: EXPERT_A,
                topic: &request.topic,
                instruction: strategy.instruction(),
                round,
                related: related.as_deref(),
                context: &request.context,
                history: recent(&history, settings.history_window),
            });
            let expert_a = self
                .call(
                    CompletionRequest::new(prompt)
                        .with_model(self.config.models.default.clone())
                        .with_temperature(EXPERT_A_TEMPERATURE)
                        .with_timeout(turn_timeout),
                )
                .await?;
            history.push((EXPERT_A, expert_a.clone()));

            // Expert B already sees Expert A's answer for this round
            let prompt = build_expert_prompt(&ExpertTurn {
                expert: EXPERT_B,
                topic: &request.topic,
                instruction: strategy.instruction(),
                round,
                related: related.as_deref(),
                context: &request.context,
                history: recent(&history, settings.history_window),
            });
            let expert_b = self
                .call(
                    CompletionRequest::new(prompt)
                        .with_model(self.config.models.fast.clone())
                        .with_temperature(EXPERT_B_TEMPERATURE)
                        .with_timeout(turn_timeout),
                )
                .await?;
            history.push((EXPERT_B, expert_b.clone()));

            let score = novelty(&expert_a, &expert_b, &rounds);
            debug!("Round {} novelty {:.3}", round, score);
            rounds.push(DebateRound {
                round_number: round,
                expert_a,
                expert_b,
                novelty: score,
            });

            if round >= min_rounds && score < settings.novelty_threshold {
                info!("Debate {} converged after {} rounds", debate_id, round);
                break;
            }
        }

        report_progress(self.progress.as_deref(), 0.9, "Generating synthesis...").await;
        let synthesis_text = self
            .call(
                CompletionRequest::new(build_synthesis_prompt(&request.topic, &rounds))
                    .with_model(self.config.models.default.clone())
                    .with_timeout(self.config.activity_timeout()),
            )
            .await?;

        let (synthesis, consensus, disagreements, actions) = match parse_structured(&synthesis_text) {
            Some(map) => (
                string_field(&map, "synthesis").unwrap_or_else(|| synthesis_text.clone()),
                string_list_field(&map, "consensus"),
                string_list_field(&map, "disagreements"),
                string_list_field(&map, "actions"),
            ),
            None => (synthesis_text, Vec::new(), Vec::new(), Vec::new()),
        };

        let result = DebateResult {
            debate_id,
            topic: request.topic,
            strategy,
            converged: rounds.len() < max_rounds,
            rounds_completed: rounds.len(),
            rounds,
            synthesis,
            consensus,
            disagreements,
            actions,
            elapsed_seconds: started.elapsed().as_secs_f64(),
        };

        if let Err(e) = self.memory.save(&result).await {
            error!("Failed to persist debate {}: {}", result.debate_id, e);
        }
        report_progress(self.progress.as_deref(), 1.0, "Debate complete").await;
        Ok(result)
    }

    /// Submit a request, enforcing its deadline locally as well
    async fn call(&self, request: CompletionRequest) -> std::result::Result<String, CompletionError> {
        let deadline = request
            .timeout
            .unwrap_or_else(|| self.config.activity_timeout());
        match tokio::time::timeout(deadline, self.port.complete(request)).await {
            Ok(Ok(completion)) => Ok(completion.text),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CompletionError::Timeout(deadline)),
        }
    }

    pub async fn load_debate(&self, debate_id: &str) -> Result<Option<DebateResult>> {
        self.memory.load(debate_id).await
    }

    pub async fn find_related_debates(&self, topic: &str, limit: usize) -> Result<Vec<RelatedDebate>> {
        self.memory.find_related(topic, limit).await
    }

    pub async fn debate_statistics(&self) -> Result<DebateStatistics> {
        self.memory.statistics().await
    }

    pub async fn list_debates(&self, limit: usize) -> Result<Vec<DebateRecord>> {
        self.memory.list(limit).await
    }

    /// Related-debate summary as an expert would see it for `topic`
    pub async fn context_summary(&self, topic: &str) -> Result<Option<String>> {
        self.memory
            .context_summary(topic, RELATED_DEBATES, self.config.debate.context_chars)
            .await
    }
}

fn recent<T>(items: &[T], window: usize) -> &[T] {
    &items[items.len().saturating_sub(window)..]
}
