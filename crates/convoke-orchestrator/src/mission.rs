//! Mission Orchestrator - architect-led delegation loop
//!
//! Each turn the architect sees the objective, the latest result from every
//! agent it has delegated to, and the action grammar. It either:
//! - emits `complete(result)`, which finishes the mission
//! - emits one or more `delegate(agent, task)` directives, which are run
//!   sequentially and fed back next turn
//! - emits neither, in which case its text is the final answer
//!
//! The loop is bounded by a turn ceiling and the activity timeout. Hitting
//! either finishes the mission as completed with the latest message, never
//! as a failure.

use convoke_agent::{parse_actions, AgentDefinition, AgentRegistry, CompletionPort, CompletionRequest};
use convoke_core::fail_open::report_progress;
use convoke_core::{
    AgentRole, CompletionError, ConvokeConfig, ConvokeError, ExecutionMode, ExecutionTrace,
    MissionStatus, ProgressSink, Result, RunState, RunningMission, SwarmMessage, SwarmResult,
    TaskStatus,
};
use convoke_store::{RecordStore, TraceRecord};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::blackboard::Blackboard;
use crate::prompt::{build_agent_prompt, build_architect_prompt, timed_out_placeholder};
use crate::running::RunningRegistry;

/// How the mission loop ended, short of an error
enum LoopOutcome {
    Completed {
        result: String,
        tasks_completed: usize,
    },
    Cancelled,
}

/// Runs missions and adjudications against a completion port
#[derive(Clone)]
pub struct SwarmOrchestrator {
    pub(crate) port: Arc<dyn CompletionPort>,
    pub(crate) registry: Arc<AgentRegistry>,
    traces: Arc<RecordStore<TraceRecord>>,
    running: Arc<RunningRegistry>,
    blackboard: Arc<Blackboard>,
    pub(crate) config: Arc<ConvokeConfig>,
    pub(crate) progress: Option<Arc<dyn ProgressSink>>,
}

impl SwarmOrchestrator {
    pub fn new(
        port: Arc<dyn CompletionPort>,
        registry: Arc<AgentRegistry>,
        traces: Arc<RecordStore<TraceRecord>>,
        config: Arc<ConvokeConfig>,
    ) -> Self {
        Self {
            port,
            registry,
            traces,
            running: Arc::new(RunningRegistry::new()),
            blackboard: Arc::new(Blackboard::new()),
            config,
            progress: None,
        }
    }

    /// Report progress to `sink`; sink failures are ignored
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn running(&self) -> &RunningRegistry {
        &self.running
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    /// Start a mission
    ///
    /// `roles` seeds the trace's agent list (architect when empty). In
    /// [`ExecutionMode::Async`] the loop is detached and the returned result
    /// is `in_progress`; poll [`Self::get_status`].
    pub async fn execute_mission(
        &self,
        objective: &str,
        mode: ExecutionMode,
        roles: &[AgentRole],
        context: &str,
    ) -> Result<SwarmResult> {
        self.config.check_input("objective", objective)?;
        self.config.check_input("context", context)?;

        let started = Instant::now();
        let mut roles = if roles.is_empty() {
            vec![AgentRole::Architect]
        } else {
            roles.to_vec()
        };
        if roles.len() > self.config.swarm.max_agents {
            warn!(
                "Mission lists {} agents, exceeding maximum {}, truncating",
                roles.len(),
                self.config.swarm.max_agents
            );
            roles.truncate(self.config.swarm.max_agents);
        }

        let mut trace = ExecutionTrace::new(objective, roles);
        trace.start();
        self.running.register(&trace.trace_id, objective);
        info!("Starting mission {} ({})", trace.trace_id, mode);

        match mode {
            ExecutionMode::Sync => Ok(self.run_mission(trace, context.to_string(), started).await),
            ExecutionMode::Async => {
                let pending = SwarmResult {
                    trace_id: trace.trace_id.clone(),
                    status: TaskStatus::InProgress,
                    result: Some("Mission started in background".to_string()),
                    error: None,
                    agents_used: trace.agents_used.clone(),
                    tasks_completed: 0,
                    total_turns: 0,
                    elapsed_seconds: started.elapsed().as_secs_f64(),
                };

                let this = self.clone();
                let context = context.to_string();
                tokio::spawn(async move {
                    let result = this.run_mission(trace, context, started).await;
                    info!(
                        "Background mission {} finished: {}",
                        result.trace_id, result.status
                    );
                });
                Ok(pending)
            }
        }
    }

    /// Run the loop to a terminal state, persist the trace and unregister it
    async fn run_mission(&self, mut trace: ExecutionTrace, context: String, started: Instant) -> SwarmResult {
        match self.drive(&mut trace, &context, started).await {
            Ok(LoopOutcome::Completed {
                result,
                tasks_completed,
            }) => {
                let summary = self
                    .finalize(trace, TaskStatus::Completed, Some(result), None, tasks_completed, started)
                    .await;
                report_progress(self.progress.as_deref(), 1.0, "Mission complete").await;
                summary
            }
            Ok(LoopOutcome::Cancelled) => {
                info!("Mission {} cancelled", trace.trace_id);
                self.finalize(trace, TaskStatus::Cancelled, None, None, 0, started)
                    .await
            }
            Err(e) => {
                error!("Mission {} failed: {}", trace.trace_id, e);
                self.finalize(trace, TaskStatus::Failed, None, Some(e.to_string()), 0, started)
                    .await
            }
        }
    }

    async fn drive(
        &self,
        trace: &mut ExecutionTrace,
        context: &str,
        started: Instant,
    ) -> Result<LoopOutcome> {
        let timeout = self.config.activity_timeout();
        let max_turns = self.config.turn_ceiling();
        let max_depth = self.config.swarm.max_depth;
        let architect = self
            .registry
            .get(&AgentRole::Architect)
            .cloned()
            .ok_or_else(|| ConvokeError::UnknownAgent(AgentRole::Architect.to_string()))?;
        let custom_agents = self.registry.custom_slugs();

        // Latest result per delegated role, in first-delegation order
        let mut results: Vec<(AgentRole, String)> = Vec::new();
        let mut turn = 0;

        while turn < max_turns {
            turn += 1;
            trace.total_turns = turn;

            let elapsed = started.elapsed();
            if elapsed > timeout {
                warn!(
                    "Mission {} timed out after {:.0}s",
                    trace.trace_id,
                    elapsed.as_secs_f64()
                );
                break;
            }

            let fraction = (turn as f32 / (max_turns + 1) as f32).min(0.9);
            report_progress(
                self.progress.as_deref(),
                fraction,
                &format!("Turn {}/{}...", turn, max_turns),
            )
            .await;

            let prompt = build_architect_prompt(
                &trace.objective,
                context,
                &results,
                self.config.swarm.result_digest_chars,
                turn,
                max_turns,
                &custom_agents,
            );
            let request = self.agent_request(&architect, prompt, timeout);
            let text = self.call(request).await?;

            if !self.running.is_running(&trace.trace_id) {
                return Ok(LoopOutcome::Cancelled);
            }

            trace
                .messages
                .push(SwarmMessage::from_agent(AgentRole::Architect, text.clone()));

            let actions = parse_actions(&text);
            debug!(
                "Turn {}: {} delegations, completion={}",
                turn,
                actions.delegations.len(),
                actions.completion.is_some()
            );

            if let Some(result) = actions.completion {
                return Ok(LoopOutcome::Completed {
                    result,
                    tasks_completed: results.len() + 1,
                });
            }

            if actions.delegations.is_empty() {
                return Ok(LoopOutcome::Completed {
                    result: text,
                    tasks_completed: results.len() + 1,
                });
            }

            let remaining = self
                .config
                .delegation_floor()
                .max(timeout.saturating_sub(started.elapsed()));

            for delegation in actions.delegations.iter().take(max_depth) {
                let Some(agent) = self.registry.resolve(&delegation.agent).cloned() else {
                    warn!("Unknown agent '{}', skipping delegation", delegation.agent);
                    continue;
                };
                trace.note_agent(agent.role.clone());

                let prompt = build_agent_prompt(&trace.objective, &delegation.task, context);
                let request = self.agent_request(&agent, prompt, remaining);
                let sub_result = match self.call(request).await {
                    Ok(text) => text,
                    Err(CompletionError::Timeout(after)) => {
                        warn!("Agent {} timed out after {:?}", delegation.agent, after);
                        timed_out_placeholder(&delegation.agent)
                    }
                    Err(e) => return Err(e.into()),
                };

                if !self.running.is_running(&trace.trace_id) {
                    return Ok(LoopOutcome::Cancelled);
                }

                self.blackboard.write(
                    format!("{}/{}", trace.trace_id, agent.role),
                    Value::String(sub_result.clone()),
                );
                trace
                    .messages
                    .push(SwarmMessage::from_agent(agent.role.clone(), sub_result.clone()));

                match results.iter_mut().find(|(role, _)| *role == agent.role) {
                    Some((_, existing)) => *existing = sub_result,
                    None => results.push((agent.role, sub_result)),
                }
            }
        }

        info!(
            "Mission {} stopped after {} turns without completing",
            trace.trace_id, trace.total_turns
        );
        Ok(LoopOutcome::Completed {
            result: trace.last_message().unwrap_or_default().to_string(),
            tasks_completed: results.len(),
        })
    }

    pub(crate) fn agent_request(
        &self,
        agent: &AgentDefinition,
        prompt: String,
        timeout: Duration,
    ) -> CompletionRequest {
        CompletionRequest::new(prompt)
            .with_system_instruction(agent.system_prompt.clone())
            .with_model(
                agent
                    .model
                    .clone()
                    .unwrap_or_else(|| self.config.models.default.clone()),
            )
            .with_timeout(timeout)
    }

    /// Submit a request, enforcing its deadline locally as well
    pub(crate) async fn call(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<String, CompletionError> {
        let deadline = request
            .timeout
            .unwrap_or_else(|| self.config.activity_timeout());
        match tokio::time::timeout(deadline, self.port.complete(request)).await {
            Ok(Ok(completion)) => Ok(completion.text),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CompletionError::Timeout(deadline)),
        }
    }

    async fn finalize(
        &self,
        mut trace: ExecutionTrace,
        status: TaskStatus,
        result: Option<String>,
        error: Option<String>,
        tasks_completed: usize,
        started: Instant,
    ) -> SwarmResult {
        if !trace.finish(status, result, error) {
            warn!("Trace {} was already terminal", trace.trace_id);
        }

        if let Err(e) = self.traces.save(&TraceRecord::from(&trace)).await {
            error!("Failed to persist trace {}: {}", trace.trace_id, e);
        }
        self.running.unregister(&trace.trace_id);
        self.blackboard
            .clear_prefix(&format!("{}/", trace.trace_id));

        SwarmResult {
            trace_id: trace.trace_id,
            status: trace.status,
            result: trace.result,
            error: trace.error,
            agents_used: trace.agents_used,
            tasks_completed,
            total_turns: trace.total_turns,
            elapsed_seconds: started.elapsed().as_secs_f64(),
        }
    }

    /// Running state from the registry, else the persisted outcome
    pub async fn get_status(&self, trace_id: &str) -> Result<Option<MissionStatus>> {
        if let Some(mission) = self.running.get(trace_id) {
            return Ok(Some(match mission.state {
                RunState::Running => MissionStatus::Running {
                    objective: mission.objective,
                    started_at: mission.started_at,
                },
                RunState::Cancelled => MissionStatus::Finished {
                    status: TaskStatus::Cancelled,
                    result: None,
                    error: None,
                },
            }));
        }

        Ok(self.traces.load(trace_id).await?.map(|record| MissionStatus::Finished {
            status: record.status,
            result: record.result,
            error: record.error,
        }))
    }

    /// Persisted trace of a finished mission
    pub async fn get_trace(&self, trace_id: &str) -> Result<Option<ExecutionTrace>> {
        Ok(self.traces.load(trace_id).await?.map(ExecutionTrace::from))
    }

    /// Request cooperative cancellation of a running mission
    pub fn cancel(&self, trace_id: &str) -> bool {
        self.running.cancel(trace_id)
    }

    pub fn list_running(&self) -> Vec<RunningMission> {
        self.running.list_running()
    }

    /// Most recently persisted missions
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<ExecutionTrace>> {
        Ok(self
            .traces
            .list_recent(limit)
            .await?
            .into_iter()
            .map(ExecutionTrace::from)
            .collect())
    }

    /// Delegated results published so far by a running mission, as (role, text)
    pub fn partial_results(&self, trace_id: &str) -> Vec<(String, String)> {
        let prefix = format!("{}/", trace_id);
        self.blackboard
            .entries_with_prefix(&prefix)
            .into_iter()
            .map(|(key, entry)| {
                let role = key[prefix.len()..].to_string();
                let text = match entry.value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (role, text)
            })
            .collect()
    }
}
