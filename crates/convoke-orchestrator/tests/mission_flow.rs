//! End-to-end mission and adjudication flows against a scripted completion port

use async_trait::async_trait;
use convoke_agent::{parse_persona, AgentRegistry, ScriptedCompletion};
use convoke_core::{
    AdjudicationStrategy, AgentRole, CompletionError, ConvokeConfig, ConvokeError, ExecutionMode,
    MissionStatus, ProgressSink, TaskStatus,
};
use convoke_orchestrator::SwarmOrchestrator;
use convoke_store::RecordStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn test_config(dir: &TempDir) -> ConvokeConfig {
    let mut config = ConvokeConfig::default();
    config.storage.data_dir = dir.path().to_path_buf();
    config.storage.lock_timeout_ms = 500;
    config
}

fn build(port: &Arc<ScriptedCompletion>, config: ConvokeConfig) -> SwarmOrchestrator {
    build_with_registry(port, config, AgentRegistry::new())
}

fn build_with_registry(
    port: &Arc<ScriptedCompletion>,
    config: ConvokeConfig,
    registry: AgentRegistry,
) -> SwarmOrchestrator {
    let traces = Arc::new(RecordStore::open(
        config.traces_dir(),
        config.storage.max_records,
        config.lock_timeout(),
    ));
    SwarmOrchestrator::new(port.clone(), Arc::new(registry), traces, Arc::new(config))
}

async fn wait_until_finished(orchestrator: &SwarmOrchestrator, trace_id: &str) {
    for _ in 0..200 {
        if orchestrator.running().get(trace_id).is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("mission {} never finished", trace_id);
}

#[tokio::test]
async fn test_completes_in_one_turn() {
    let dir = TempDir::new().unwrap();
    let port = Arc::new(ScriptedCompletion::new().with_reply(r#"complete("X")"#));
    let orchestrator = build(&port, test_config(&dir));

    let result = orchestrator
        .execute_mission("Say X", ExecutionMode::Sync, &[], "")
        .await
        .unwrap();

    assert_eq!(result.status, TaskStatus::Completed);
    assert_eq!(result.result.as_deref(), Some("X"));
    assert_eq!(result.total_turns, 1);
    assert_eq!(result.tasks_completed, 1);
    assert_eq!(port.call_count(), 1);

    let trace = orchestrator.get_trace(&result.trace_id).await.unwrap().unwrap();
    assert_eq!(trace.status, TaskStatus::Completed);
    assert_eq!(trace.agents_used, vec![AgentRole::Architect]);
    assert!(trace.completed_at.is_some());
    assert!(orchestrator.list_running().is_empty());
}

#[tokio::test]
async fn test_delegation_result_reaches_architect() {
    let dir = TempDir::new().unwrap();
    let port = Arc::new(
        ScriptedCompletion::new()
            .with_reply("delegate(coder, \"write the parser\")")
            .with_reply("fn parse() {}")
            .with_reply("complete(parser delivered)"),
    );
    let orchestrator = build(&port, test_config(&dir));

    let result = orchestrator
        .execute_mission("Build a parser", ExecutionMode::Sync, &[], "Rust only")
        .await
        .unwrap();

    assert_eq!(result.result.as_deref(), Some("parser delivered"));
    assert_eq!(result.tasks_completed, 2);
    assert_eq!(result.total_turns, 2);
    assert_eq!(result.agents_used, vec![AgentRole::Architect, AgentRole::Coder]);

    let requests = port.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests[1].prompt.contains("Your task: write the parser"));
    assert!(requests[1].prompt.contains("Additional context: Rust only"));
    assert!(requests[2].prompt.contains("[coder]:\nfn parse() {}"));
    assert!(requests[2].prompt.contains("Turn 2/10."));
    assert_ne!(requests[0].system_instruction, requests[1].system_instruction);
}

#[tokio::test]
async fn test_plain_answer_is_final() {
    let dir = TempDir::new().unwrap();
    let port = Arc::new(ScriptedCompletion::new().with_reply("The answer is 42."));
    let orchestrator = build(&port, test_config(&dir));

    let result = orchestrator
        .execute_mission("Answer", ExecutionMode::Sync, &[], "")
        .await
        .unwrap();
    assert_eq!(result.status, TaskStatus::Completed);
    assert_eq!(result.result.as_deref(), Some("The answer is 42."));
}

#[tokio::test]
async fn test_unknown_agent_is_skipped() {
    let dir = TempDir::new().unwrap();
    let port = Arc::new(
        ScriptedCompletion::new()
            .with_reply("delegate(astronaut, fly to the moon)")
            .with_reply("complete(stayed home)"),
    );
    let orchestrator = build(&port, test_config(&dir));

    let result = orchestrator
        .execute_mission("Travel", ExecutionMode::Sync, &[], "")
        .await
        .unwrap();
    assert_eq!(result.result.as_deref(), Some("stayed home"));
    assert_eq!(port.call_count(), 2);
    assert_eq!(result.agents_used, vec![AgentRole::Architect]);
}

#[tokio::test]
async fn test_delegations_capped_by_depth() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.swarm.max_depth = 1;
    let port = Arc::new(
        ScriptedCompletion::new()
            .with_reply("delegate(coder, a)\ndelegate(tester, b)")
            .with_reply("coded")
            .with_reply("complete(z)"),
    );
    let orchestrator = build(&port, config);

    let result = orchestrator
        .execute_mission("Cap depth", ExecutionMode::Sync, &[], "")
        .await
        .unwrap();
    assert_eq!(result.result.as_deref(), Some("z"));
    assert_eq!(port.call_count(), 3);
    assert!(!result.agents_used.contains(&AgentRole::Tester));
}

#[tokio::test]
async fn test_turn_ceiling_completes_with_last_message() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.swarm.max_depth = 1; // ceiling = min(10, 4)
    let port = Arc::new(ScriptedCompletion::new().with_fallback("delegate(coder, again)"));
    let orchestrator = build(&port, config);

    let result = orchestrator
        .execute_mission("Loop forever", ExecutionMode::Sync, &[], "")
        .await
        .unwrap();

    assert_eq!(result.status, TaskStatus::Completed);
    assert_eq!(result.total_turns, 4);
    assert_eq!(result.tasks_completed, 1);
    assert_eq!(result.result.as_deref(), Some("delegate(coder, again)"));
    assert_eq!(port.call_count(), 8);
}

#[tokio::test]
async fn test_sub_agent_timeout_becomes_placeholder() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.timeouts.activity_secs = 1;
    config.timeouts.delegation_floor_secs = 1;
    let port = Arc::new(
        ScriptedCompletion::new()
            .with_reply("delegate(coder, slow work)")
            .with_delayed_reply("too late", Duration::from_secs(3)),
    );
    let orchestrator = build(&port, config);

    let result = orchestrator
        .execute_mission("Be quick", ExecutionMode::Sync, &[], "")
        .await
        .unwrap();

    // The mission budget is spent by the slow agent, so the loop stops there
    assert_eq!(result.status, TaskStatus::Completed);
    assert_eq!(result.result.as_deref(), Some("[Agent coder timed out]"));
    assert_eq!(port.call_count(), 2);
}

#[tokio::test]
async fn test_upstream_failure_is_persisted() {
    let dir = TempDir::new().unwrap();
    let port = Arc::new(
        ScriptedCompletion::new().with_error(CompletionError::Upstream("503 unavailable".into())),
    );
    let orchestrator = build(&port, test_config(&dir));

    let result = orchestrator
        .execute_mission("Doomed", ExecutionMode::Sync, &[], "")
        .await
        .unwrap();
    assert_eq!(result.status, TaskStatus::Failed);
    assert!(result.error.as_deref().unwrap().contains("503 unavailable"));

    match orchestrator.get_status(&result.trace_id).await.unwrap() {
        Some(MissionStatus::Finished { status, error, .. }) => {
            assert_eq!(status, TaskStatus::Failed);
            assert!(error.is_some());
        }
        other => panic!("unexpected status: {:?}", other),
    }
    assert!(orchestrator.list_running().is_empty());
}

#[tokio::test]
async fn test_async_mission_reports_running_then_finished() {
    let dir = TempDir::new().unwrap();
    let port = Arc::new(ScriptedCompletion::new());
    port.push(Ok("complete(background done)".into()), Some(Duration::from_millis(300)));
    let orchestrator = build(&port, test_config(&dir));

    let started = orchestrator
        .execute_mission("Work later", ExecutionMode::Async, &[], "")
        .await
        .unwrap();
    assert_eq!(started.status, TaskStatus::InProgress);

    assert!(matches!(
        orchestrator.get_status(&started.trace_id).await.unwrap(),
        Some(MissionStatus::Running { .. })
    ));
    assert_eq!(orchestrator.list_running().len(), 1);

    wait_until_finished(&orchestrator, &started.trace_id).await;

    match orchestrator.get_status(&started.trace_id).await.unwrap() {
        Some(MissionStatus::Finished { status, result, .. }) => {
            assert_eq!(status, TaskStatus::Completed);
            assert_eq!(result.as_deref(), Some("background done"));
        }
        other => panic!("unexpected status: {:?}", other),
    }
    assert_eq!(orchestrator.list_recent(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancel_stops_after_current_call() {
    let dir = TempDir::new().unwrap();
    let port = Arc::new(ScriptedCompletion::new().with_fallback("never used"));
    port.push(Ok("delegate(coder, big job)".into()), Some(Duration::from_millis(300)));
    let orchestrator = build(&port, test_config(&dir));

    let started = orchestrator
        .execute_mission("Cancel me", ExecutionMode::Async, &[], "")
        .await
        .unwrap();
    assert!(orchestrator.cancel(&started.trace_id));

    assert!(matches!(
        orchestrator.get_status(&started.trace_id).await.unwrap(),
        Some(MissionStatus::Finished {
            status: TaskStatus::Cancelled,
            ..
        })
    ));

    wait_until_finished(&orchestrator, &started.trace_id).await;

    let trace = orchestrator.get_trace(&started.trace_id).await.unwrap().unwrap();
    assert_eq!(trace.status, TaskStatus::Cancelled);
    assert_eq!(port.call_count(), 1, "delegation never ran");
    assert!(!orchestrator.cancel(&started.trace_id));
}

#[tokio::test]
async fn test_oversized_objective_rejected_before_any_call() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.limits.max_context_tokens = 1000;
    let port = Arc::new(ScriptedCompletion::new().with_fallback("complete(x)"));
    let orchestrator = build(&port, config);

    let err = orchestrator
        .execute_mission(&"o".repeat(4001), ExecutionMode::Sync, &[], "")
        .await
        .unwrap_err();
    assert!(matches!(err, ConvokeError::InputTooLarge { field: "objective", .. }));
    assert_eq!(port.call_count(), 0);
}

#[tokio::test]
async fn test_custom_persona_can_be_delegated_to() {
    let dir = TempDir::new().unwrap();
    let mut registry = AgentRegistry::new();
    registry
        .register(parse_persona("ux_designer", "# UX Designer\n\n## Role\nDesigns flows.\n").unwrap())
        .unwrap();
    let port = Arc::new(
        ScriptedCompletion::new()
            .with_reply("delegate(ux_designer, sketch the signup flow)")
            .with_reply("three screens")
            .with_reply("complete(designed)"),
    );
    let orchestrator = build_with_registry(&port, test_config(&dir), registry);

    let result = orchestrator
        .execute_mission("Design signup", ExecutionMode::Sync, &[], "")
        .await
        .unwrap();

    assert_eq!(result.result.as_deref(), Some("designed"));
    assert!(result
        .agents_used
        .contains(&AgentRole::Custom("ux_designer".into())));
    let requests = port.requests();
    assert!(requests[0].prompt.contains("documenter, ux_designer"));
    assert!(requests[1]
        .system_instruction
        .as_deref()
        .unwrap()
        .contains("Designs flows."));
}

#[tokio::test]
async fn test_hyphenated_persona_can_be_delegated_to() {
    let dir = TempDir::new().unwrap();
    let mut registry = AgentRegistry::new();
    registry
        .register(parse_persona("code-reviewer", "# Code Reviewer\n\n## Role\nReads diffs.\n").unwrap())
        .unwrap();
    let port = Arc::new(
        ScriptedCompletion::new()
            .with_reply("delegate(code-reviewer, review the patch)")
            .with_reply("looks fine")
            .with_reply("complete(reviewed)"),
    );
    let orchestrator = build_with_registry(&port, test_config(&dir), registry);

    let result = orchestrator
        .execute_mission("Review", ExecutionMode::Sync, &[], "")
        .await
        .unwrap();

    assert_eq!(result.result.as_deref(), Some("reviewed"));
    assert_eq!(port.call_count(), 3);
    assert!(result
        .agents_used
        .contains(&AgentRole::Custom("code-reviewer".into())));
}

#[tokio::test]
async fn test_oversized_panel_is_truncated() {
    let dir = TempDir::new().unwrap();
    let mut port = ScriptedCompletion::new();
    for _ in 0..10 {
        port = port.with_reply(r#"{"position": "ship it", "confidence": 0.5}"#);
    }
    let port = Arc::new(port.with_reply(
        r#"{"verdict": "Ship", "reasoning": "broad support", "confidence": 0.9, "dissenting_opinions": "one holdout"}"#,
    ));
    let orchestrator = build(&port, test_config(&dir));

    let panel: Vec<String> = (0..15).map(|_| "reviewer".to_string()).collect();
    let result = orchestrator
        .adjudicate("Ship on Friday?", &panel, AdjudicationStrategy::SupremeCourt)
        .await
        .unwrap();

    assert_eq!(result.panel_votes.len(), 10);
    assert_eq!(port.call_count(), 11);
    assert_eq!(result.verdict, "Ship");
    assert_eq!(result.reasoning, "broad support");
    assert_eq!(result.confidence, 0.9);
    assert_eq!(result.dissenting_opinions, vec!["one holdout"]);
    assert_eq!(
        port.requests()[10].system_instruction.as_deref(),
        Some("You are a fair and balanced judge synthesizing expert opinions.")
    );
}

#[tokio::test]
async fn test_unknown_panelist_sits_as_analyst() {
    let dir = TempDir::new().unwrap();
    let port = Arc::new(
        ScriptedCompletion::new()
            .with_reply(r#"{"position": "maybe", "confidence": 0.4}"#)
            .with_reply("No JSON verdict, just prose."),
    );
    let orchestrator = build(&port, test_config(&dir));

    let result = orchestrator
        .adjudicate("Is it safe?", &["wizard".to_string()], AdjudicationStrategy::Majority)
        .await
        .unwrap();

    assert_eq!(result.panel_votes[0].agent, AgentRole::Analyst);
    assert_eq!(result.verdict, "No JSON verdict, just prose.");
    assert_eq!(result.confidence, 0.4);
    assert!(result.dissenting_opinions.is_empty());
}

#[tokio::test]
async fn test_default_panel() {
    let dir = TempDir::new().unwrap();
    let port = Arc::new(ScriptedCompletion::new().with_fallback(r#"{"position": "ok"}"#));
    let orchestrator = build(&port, test_config(&dir));

    let result = orchestrator
        .adjudicate("Default panel?", &[], AdjudicationStrategy::Unanimous)
        .await
        .unwrap();
    let roles: Vec<_> = result.panel_votes.iter().map(|v| v.agent.clone()).collect();
    assert_eq!(
        roles,
        vec![AgentRole::Architect, AgentRole::Analyst, AgentRole::Reviewer]
    );
    assert!((result.confidence - 0.8).abs() < 1e-9);
}

struct Recorder(Mutex<Vec<f32>>);

#[async_trait]
impl ProgressSink for Recorder {
    async fn report(&self, fraction: f32, _message: &str) -> convoke_core::Result<()> {
        self.0.lock().unwrap().push(fraction);
        Ok(())
    }
}

struct Failing;

#[async_trait]
impl ProgressSink for Failing {
    async fn report(&self, _fraction: f32, _message: &str) -> convoke_core::Result<()> {
        Err(ConvokeError::Other("client went away".into()))
    }
}

#[tokio::test]
async fn test_progress_is_reported_and_fail_open() {
    let dir = TempDir::new().unwrap();
    let port = Arc::new(ScriptedCompletion::new().with_reply("complete(done)"));
    let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
    let orchestrator = build(&port, test_config(&dir)).with_progress(recorder.clone());

    orchestrator
        .execute_mission("Report", ExecutionMode::Sync, &[], "")
        .await
        .unwrap();
    let seen = recorder.0.lock().unwrap().clone();
    assert_eq!(seen.last().copied(), Some(1.0));
    assert!(seen.iter().all(|f| (0.0..=1.0).contains(f)));

    let port = Arc::new(ScriptedCompletion::new().with_reply("complete(still fine)"));
    let orchestrator = build(&port, test_config(&dir)).with_progress(Arc::new(Failing));
    let result = orchestrator
        .execute_mission("Report", ExecutionMode::Sync, &[], "")
        .await
        .unwrap();
    assert_eq!(result.status, TaskStatus::Completed);
}
