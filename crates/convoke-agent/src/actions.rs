//! Action directive scanning for architect output
//!
//! The architect steers a mission with two textual directives:
//!
//! ```text
//! delegate(coder, "Write the parser")
//! complete(The final answer)
//! ```
//!
//! Both are matched ASCII-case-insensitively. A delegation's argument list
//! must close within [`MAX_DELEGATION_CHARS`] characters; the completion
//! argument runs to the last `)` in the output so it may contain parentheses.

/// Longest accepted `delegate(...)` argument list, in characters
pub const MAX_DELEGATION_CHARS: usize = 2000;

const DELEGATE: &[u8] = b"delegate(";
const COMPLETE: &[u8] = b"complete(";

/// A request to hand a sub-task to another agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    pub agent: String,
    pub task: String,
}

/// Directives found in one architect reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchitectActions {
    pub delegations: Vec<Delegation>,
    pub completion: Option<String>,
}

impl ArchitectActions {
    pub fn is_empty(&self) -> bool {
        self.delegations.is_empty() && self.completion.is_none()
    }
}

/// Scan architect output for every directive
pub fn parse_actions(text: &str) -> ArchitectActions {
    ArchitectActions {
        delegations: parse_delegations(text),
        completion: parse_completion(text),
    }
}

/// Byte offset of the next case-insensitive occurrence of `needle` at or after `from`
///
/// `needle` is ASCII, so any match starts on a char boundary.
fn find_ascii_ci(haystack: &str, needle: &[u8], from: usize) -> Option<usize> {
    let bytes = haystack.as_bytes();
    if from > bytes.len() || bytes.len() - from < needle.len() {
        return None;
    }
    (from..=bytes.len() - needle.len()).find(|&i| bytes[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

fn strip_quotes(s: &str) -> &str {
    s.trim().trim_matches(|c| c == '"' || c == '\'')
}

/// Word characters plus `-`, matching the persona slug alphabet
fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

/// Extract `delegate(agent, task)` directives in order of appearance
///
/// The agent must be a word identifier (hyphens allowed); arguments without a comma, or
/// argument lists longer than [`MAX_DELEGATION_CHARS`], are ignored.
pub fn parse_delegations(text: &str) -> Vec<Delegation> {
    let mut found = Vec::new();
    let mut cursor = 0;

    while let Some(start) = find_ascii_ci(text, DELEGATE, cursor) {
        let args_start = start + DELEGATE.len();
        let close = text[args_start..]
            .char_indices()
            .take(MAX_DELEGATION_CHARS + 1)
            .find(|&(_, c)| c == ')')
            .map(|(i, _)| args_start + i);

        match close {
            Some(end) if end > args_start => {
                let inner = text[args_start..end].trim();
                if let Some((agent, task)) = inner.split_once(',') {
                    let agent = strip_quotes(agent);
                    if is_identifier(agent) {
                        found.push(Delegation {
                            agent: agent.to_string(),
                            task: strip_quotes(task).to_string(),
                        });
                    }
                }
                cursor = end + 1;
            }
            _ => cursor = start + 1,
        }
    }

    found
}

/// Extract the `complete(result)` argument, if any
///
/// Runs from the first `complete(` to the last `)` after it. Surrounding
/// whitespace and quotes are removed; an empty argument counts as absent.
pub fn parse_completion(text: &str) -> Option<String> {
    let start = find_ascii_ci(text, COMPLETE, 0)?;
    let args_start = start + COMPLETE.len();
    let end = args_start + text[args_start..].rfind(')')?;

    let result = strip_quotes(&text[args_start..end]);
    if result.is_empty() {
        None
    } else {
        Some(result.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_delegation() {
        let d = parse_delegations(r#"I will delegate(coder, "Write the parser") now."#);
        assert_eq!(
            d,
            vec![Delegation {
                agent: "coder".into(),
                task: "Write the parser".into()
            }]
        );
    }

    #[test]
    fn test_multiple_delegations_case_insensitive() {
        let text = "DELEGATE(researcher, find prior art)\nDelegate('tester', 'edge cases')";
        let d = parse_delegations(text);
        assert_eq!(d.len(), 2);
        assert_eq!(d[0].agent, "researcher");
        assert_eq!(d[0].task, "find prior art");
        assert_eq!(d[1].agent, "tester");
        assert_eq!(d[1].task, "edge cases");
    }

    #[test]
    fn test_task_keeps_later_commas() {
        let d = parse_delegations("delegate(analyst, compare A, B, and C)");
        assert_eq!(d[0].task, "compare A, B, and C");
    }

    #[test]
    fn test_rejects_non_identifier_agent() {
        assert!(parse_delegations("delegate(some agent, task)").is_empty());
        assert!(parse_delegations("delegate(, task)").is_empty());
        assert!(parse_delegations("delegate(coder)").is_empty());
        assert!(parse_delegations("delegate()").is_empty());
    }

    #[test]
    fn test_hyphenated_agent_accepted() {
        let d = parse_delegations("delegate(code-reviewer, check the diff)");
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].agent, "code-reviewer");
        assert_eq!(d[0].task, "check the diff");
    }

    #[test]
    fn test_unbounded_delegation_ignored() {
        let long = format!("delegate(coder, {}) ", "x".repeat(MAX_DELEGATION_CHARS + 10));
        assert!(parse_delegations(&long).is_empty());

        let fits = format!("delegate(coder,{})", "x".repeat(MAX_DELEGATION_CHARS - 6));
        assert_eq!(parse_delegations(&fits).len(), 1);
    }

    #[test]
    fn test_unclosed_delegation_then_valid() {
        let text = "delegate(coder, never closed\n".to_string() + "and delegate(tester, run)";
        // The first directive swallows up to the only ')' in the text
        let d = parse_delegations(&text);
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].agent, "coder");
    }

    #[test]
    fn test_completion_quoted() {
        assert_eq!(parse_completion(r#"complete("X")"#).as_deref(), Some("X"));
        assert_eq!(parse_completion("Complete( 'done' )").as_deref(), Some("done"));
    }

    #[test]
    fn test_completion_spans_to_last_paren() {
        let text = "complete(Use f(x) and g(y)) trailing";
        assert_eq!(parse_completion(text).as_deref(), Some("Use f(x) and g(y)"));
    }

    #[test]
    fn test_completion_multiline() {
        let text = "Summary:\ncomplete(line one\nline two)\n";
        assert_eq!(parse_completion(text).as_deref(), Some("line one\nline two"));
    }

    #[test]
    fn test_empty_completion_is_absent() {
        assert_eq!(parse_completion("complete()"), None);
        assert_eq!(parse_completion("complete(  \"\" )"), None);
        assert_eq!(parse_completion("no directive here"), None);
        assert_eq!(parse_completion("complete( unterminated"), None);
    }

    #[test]
    fn test_parse_actions_both() {
        let actions = parse_actions("delegate(coder, build it)\ncomplete(all done)");
        assert_eq!(actions.delegations.len(), 1);
        assert_eq!(actions.completion.as_deref(), Some("all done"));
        assert!(!actions.is_empty());
        assert!(parse_actions("plain answer").is_empty());
    }

    #[test]
    fn test_non_ascii_text_is_safe() {
        let text = "résumé → delegate(coder, écrire le code) ✓";
        let d = parse_delegations(text);
        assert_eq!(d[0].task, "écrire le code");
    }
}
