//! Expert-panel adjudication
//!
//! Panel members are asked for a JSON position one at a time, then a
//! presiding judge synthesizes a verdict under the chosen strategy.

use convoke_agent::structured::{number_field, string_field, string_list_field};
use convoke_agent::{parse_structured, CompletionRequest};
use convoke_core::fail_open::report_progress;
use convoke_core::{
    short_id, AdjudicationResult, AdjudicationStrategy, AgentRole, ConvokeError, PanelVote, Result,
};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::mission::SwarmOrchestrator;
use crate::prompt::{build_panel_prompt, build_verdict_prompt};

/// Confidence assumed when a member does not report a usable one
const DEFAULT_CONFIDENCE: f64 = 0.8;

const DEFAULT_PANEL: [&str; 3] = ["architect", "analyst", "reviewer"];

const JUDGE_INSTRUCTION: &str = "You are a fair and balanced judge synthesizing expert opinions.";

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        DEFAULT_CONFIDENCE
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Build a vote from a member's raw reply
fn parse_vote(agent: AgentRole, reply: &str) -> PanelVote {
    let Some(map) = parse_structured(reply) else {
        debug!("Panel member {} replied without JSON", agent);
        return PanelVote {
            agent,
            position: reply.to_string(),
            reasoning: String::new(),
            confidence: DEFAULT_CONFIDENCE,
            concerns: Vec::new(),
        };
    };

    PanelVote {
        agent,
        position: string_field(&map, "position").unwrap_or_else(|| reply.to_string()),
        reasoning: string_field(&map, "reasoning").unwrap_or_default(),
        confidence: clamp_confidence(number_field(&map, "confidence").unwrap_or(DEFAULT_CONFIDENCE)),
        concerns: string_list_field(&map, "concerns"),
    }
}

impl SwarmOrchestrator {
    /// Convene an expert panel on `query`
    ///
    /// An empty panel uses architect, analyst and reviewer. Panels beyond
    /// the configured maximum are truncated; unknown members sit as analyst.
    pub async fn adjudicate(
        &self,
        query: &str,
        panel: &[String],
        strategy: AdjudicationStrategy,
    ) -> Result<AdjudicationResult> {
        self.config.check_input("query", query)?;

        let trace_id = short_id();
        let started = Instant::now();
        let timeout = self.config.activity_timeout();

        let mut members: Vec<String> = if panel.is_empty() {
            DEFAULT_PANEL.iter().map(|s| s.to_string()).collect()
        } else {
            panel.to_vec()
        };
        let max_panel = self.config.swarm.max_panel_size;
        if members.len() > max_panel {
            warn!(
                "Panel size {} exceeds maximum {}, truncating",
                members.len(),
                max_panel
            );
            members.truncate(max_panel);
        }

        info!(
            "Adjudication {} with {} panelists ({})",
            trace_id,
            members.len(),
            strategy
        );

        let mut votes = Vec::with_capacity(members.len());
        for (i, name) in members.iter().enumerate() {
            report_progress(
                self.progress.as_deref(),
                (i + 1) as f32 / (members.len() + 1) as f32,
                &format!("Expert {} deliberating...", name),
            )
            .await;

            let agent = match self.registry.resolve(name) {
                Some(agent) => agent.clone(),
                None => {
                    warn!("Unknown persona: {}, using analyst", name);
                    self.registry
                        .get(&AgentRole::Analyst)
                        .cloned()
                        .ok_or_else(|| ConvokeError::UnknownAgent(name.clone()))?
                }
            };

            let prompt = build_panel_prompt(&agent.description, query);
            let reply = self.call(self.agent_request(&agent, prompt, timeout)).await?;
            votes.push(parse_vote(agent.role, &reply));
        }

        report_progress(self.progress.as_deref(), 0.9, "Synthesizing verdict...").await;

        let request = CompletionRequest::new(build_verdict_prompt(query, &votes, strategy))
            .with_system_instruction(JUDGE_INSTRUCTION)
            .with_model(self.config.models.default.clone())
            .with_timeout(timeout);
        let verdict_text = self.call(request).await?;

        let mean_confidence =
            votes.iter().map(|v| v.confidence).sum::<f64>() / votes.len().max(1) as f64;

        let (verdict, reasoning, confidence, dissenting_opinions) = match parse_structured(&verdict_text) {
            Some(map) => (
                string_field(&map, "verdict").unwrap_or_else(|| verdict_text.clone()),
                string_field(&map, "reasoning").unwrap_or_default(),
                number_field(&map, "confidence")
                    .map(clamp_confidence)
                    .unwrap_or(mean_confidence),
                string_list_field(&map, "dissenting_opinions"),
            ),
            None => (verdict_text, String::new(), mean_confidence, Vec::new()),
        };

        report_progress(self.progress.as_deref(), 1.0, "Verdict reached").await;

        Ok(AdjudicationResult {
            trace_id,
            query: query.to_string(),
            verdict,
            reasoning,
            confidence,
            panel_votes: votes,
            dissenting_opinions,
            elapsed_seconds: started.elapsed().as_secs_f64(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vote_json() {
        let vote = parse_vote(
            AgentRole::Reviewer,
            r#"{"position": "Use Postgres", "reasoning": "mature", "confidence": 1.4, "concerns": ["ops cost"]}"#,
        );
        assert_eq!(vote.position, "Use Postgres");
        assert_eq!(vote.reasoning, "mature");
        assert_eq!(vote.confidence, 1.0);
        assert_eq!(vote.concerns, vec!["ops cost"]);
    }

    #[test]
    fn test_parse_vote_free_text_defaults() {
        let vote = parse_vote(AgentRole::Analyst, "I lean towards SQLite.");
        assert_eq!(vote.position, "I lean towards SQLite.");
        assert_eq!(vote.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_parse_vote_bad_confidence() {
        let vote = parse_vote(AgentRole::Analyst, r#"{"position": "x", "confidence": "high"}"#);
        assert_eq!(vote.confidence, DEFAULT_CONFIDENCE);
        let vote = parse_vote(AgentRole::Analyst, r#"{"position": "x", "confidence": -3}"#);
        assert_eq!(vote.confidence, 0.0);
    }
}
