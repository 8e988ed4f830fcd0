//! Prompt builders for the architect, delegated agents and the panel
//!
//! Prompts are plain text sections joined by blank lines. The architect is
//! always told which directives it may emit and which agents exist.

use convoke_core::text::truncate_chars;
use convoke_core::{AdjudicationStrategy, AgentRole, PanelVote};

/// Characters of each panel position shown to the presiding judge
const VOTE_EXCERPT_CHARS: usize = 500;

const BUILTIN_DELEGATES: &str = "researcher, coder, analyst, reviewer, tester, documenter";

/// Result recorded for a delegated agent that exceeded its deadline
pub fn timed_out_placeholder(agent: &str) -> String {
    format!("[Agent {} timed out]", agent)
}

/// Build the architect prompt for one turn
///
/// `results` holds the latest result per delegated role, in first-delegation
/// order; each is cut to `digest_chars` characters.
pub fn build_architect_prompt(
    objective: &str,
    context: &str,
    results: &[(AgentRole, String)],
    digest_chars: usize,
    turn: usize,
    max_turns: usize,
    custom_agents: &[&str],
) -> String {
    let mut parts = vec![format!("Mission Objective: {}", objective)];

    if !context.is_empty() {
        parts.push(format!("Context: {}", context));
    }

    if !results.is_empty() {
        parts.push("--- Results from delegated agents ---".to_string());
        for (role, result) in results {
            parts.push(format!("[{}]:\n{}", role, truncate_chars(result, digest_chars)));
        }
        parts.push("--- End of agent results ---".to_string());
    }

    parts.push(format!("Turn {}/{}.", turn, max_turns));

    let agents = if custom_agents.is_empty() {
        BUILTIN_DELEGATES.to_string()
    } else {
        format!("{}, {}", BUILTIN_DELEGATES, custom_agents.join(", "))
    };

    parts.push(format!(
        "Actions:\n\
         \x20 delegate(agent_name, task_description): assign work to a specialist\n\
         \x20 complete(final_result): finish the mission with your answer\n\n\
         Available agents: {}\n\n\
         If you can answer directly, use complete(your_answer). \
         Otherwise delegate sub-tasks, then integrate their results on the next turn.",
        agents
    ));

    parts.join("\n\n")
}

/// Build the prompt for a delegated agent
pub fn build_agent_prompt(objective: &str, task: &str, context: &str) -> String {
    let mut prompt = format!("Mission context: {}\n\nYour task: {}\n\n", objective, task);
    if !context.is_empty() {
        prompt.push_str(&format!("Additional context: {}\n\n", context));
    }
    prompt.push_str("Provide a thorough, actionable response.");
    prompt
}

/// Build the position request sent to one panel member
pub fn build_panel_prompt(role_description: &str, query: &str) -> String {
    format!(
        "As a {} expert, provide your expert position on:\n\n\
         {}\n\n\
         Respond in JSON with these fields:\n\
         - \"position\": your clear recommendation\n\
         - \"reasoning\": supporting arguments\n\
         - \"confidence\": float 0.0 to 1.0\n\
         - \"concerns\": list of caveats",
        role_description, query
    )
}

/// Build the synthesis request for the presiding judge
pub fn build_verdict_prompt(
    query: &str,
    votes: &[PanelVote],
    strategy: AdjudicationStrategy,
) -> String {
    let mut prompt = format!(
        "As the presiding judge, synthesize these expert opinions:\n\n\
         Query: {}\n\n\
         Expert Opinions:\n",
        query
    );

    for vote in votes {
        prompt.push_str(&format!(
            "- {} (confidence {:.2}): {}...\n",
            vote.agent,
            vote.confidence,
            truncate_chars(&vote.position, VOTE_EXCERPT_CHARS)
        ));
    }

    prompt.push_str(&format!("\nStrategy: {}\n\n", strategy.instruction()));
    prompt.push_str(
        "Provide in JSON:\n\
         - \"verdict\": final verdict\n\
         - \"reasoning\": synthesized reasoning\n\
         - \"confidence\": overall confidence (0.0-1.0)\n\
         - \"dissenting_opinions\": list of notable disagreements",
    );
    prompt
}
