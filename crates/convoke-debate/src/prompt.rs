//! Expert and synthesis prompt builders

use convoke_core::text::truncate_chars;
use convoke_core::DebateRound;

/// Characters of each prior response shown to an expert
const HISTORY_EXCERPT_CHARS: usize = 500;

/// Characters of each response quoted in the synthesis prompt
const SYNTHESIS_EXCERPT_CHARS: usize = 300;

/// Everything an expert sees for one turn
pub(crate) struct ExpertTurn<'a> {
    pub expert: &'a str,
    pub topic: &'a str,
    pub instruction: &'a str,
    pub round: usize,
    pub related: Option<&'a str>,
    pub context: &'a str,
    /// Most recent responses as (expert, text), oldest first
    pub history: &'a [(&'static str, String)],
}

pub(crate) fn build_expert_prompt(turn: &ExpertTurn<'_>) -> String {
    let mut prompt = format!(
        "You are {} in a structured debate.\n\nTopic: {}\nStrategy: {}\nRound: {}\n\n",
        turn.expert, turn.topic, turn.instruction, turn.round
    );

    if let Some(related) = turn.related {
        prompt.push_str(&format!("Related past discussions: {}\n", related));
    }
    if !turn.context.is_empty() {
        prompt.push_str(&format!("Additional context: {}\n", turn.context));
    }
    if turn.related.is_some() || !turn.context.is_empty() {
        prompt.push('\n');
    }

    if !turn.history.is_empty() {
        prompt.push_str("Previous responses:\n");
        for (name, text) in turn.history {
            prompt.push_str(&format!(
                "\n{}: {}...\n",
                name,
                truncate_chars(text, HISTORY_EXCERPT_CHARS)
            ));
        }
    }

    prompt.push_str(&format!(
        "\nProvide your perspective as {}. Be substantive and address key points.",
        turn.expert
    ));
    prompt
}

pub(crate) fn build_synthesis_prompt(topic: &str, rounds: &[DebateRound]) -> String {
    let summary = rounds
        .iter()
        .map(|r| {
            format!(
                "Round {}:\n  Expert A: {}...\n  Expert B: {}...",
                r.round_number,
                truncate_chars(&r.expert_a, SYNTHESIS_EXCERPT_CHARS),
                truncate_chars(&r.expert_b, SYNTHESIS_EXCERPT_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Synthesize this debate on: {}\n\n{}\n\n\
         Respond with ONLY a JSON object (no markdown fences):\n\
         {{\n\
         \x20 \"synthesis\": \"Overall conclusion\",\n\
         \x20 \"consensus\": [\"agreed point 1\", \"agreed point 2\"],\n\
         \x20 \"disagreements\": [\"unresolved point 1\"],\n\
         \x20 \"actions\": [\"recommended action 1\"]\n\
         }}",
        topic, summary
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn<'a>(history: &'a [(&'static str, String)], related: Option<&'a str>, context: &'a str) -> ExpertTurn<'a> {
        ExpertTurn {
            expert: "Expert B",
            topic: "Tabs or spaces",
            instruction: "Challenge each other's positions rigorously.",
            round: 2,
            related,
            context,
            history,
        }
    }

    #[test]
    fn test_first_turn_prompt() {
        let prompt = build_expert_prompt(&turn(&[], None, ""));
        assert_eq!(
            prompt,
            "You are Expert B in a structured debate.\n\n\
             Topic: Tabs or spaces\n\
             Strategy: Challenge each other's positions rigorously.\n\
             Round: 2\n\n\
             \nProvide your perspective as Expert B. Be substantive and address key points."
        );
    }

    #[test]
    fn test_prompt_with_history_and_context() {
        let history = vec![("Expert A", "x".repeat(600)), ("Expert B", "short".to_string())];
        let prompt = build_expert_prompt(&turn(&history, Some("Topic: editors"), "team of five"));

        assert!(prompt.contains("Related past discussions: Topic: editors\nAdditional context: team of five\n\nPrevious responses:\n"));
        assert!(prompt.contains(&format!("\nExpert A: {}...\n", "x".repeat(500))));
        assert!(prompt.contains("\nExpert B: short...\n"));
    }

    #[test]
    fn test_synthesis_prompt_quotes_rounds() {
        let rounds = vec![DebateRound {
            round_number: 1,
            expert_a: "a".repeat(400),
            expert_b: "b".into(),
            novelty: 1.0,
        }];
        let prompt = build_synthesis_prompt("Tabs or spaces", &rounds);
        assert!(prompt.starts_with("Synthesize this debate on: Tabs or spaces\n\nRound 1:\n"));
        assert!(prompt.contains(&format!("  Expert A: {}...\n", "a".repeat(300))));
        assert!(prompt.contains("  Expert B: b..."));
        assert!(prompt.contains("\"disagreements\""));
    }
}
