//! Completion adapter that shells out to an external program
//!
//! The prompt is written to the program's stdin and the answer read from its
//! stdout. Request parameters travel as `CONVOKE_*` environment variables so
//! any model CLI can be wrapped by a small script.

use async_trait::async_trait;
use convoke_core::CompletionError;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::completion::{Completion, CompletionPort, CompletionRequest, Usage};

/// Rough token estimate for adapters that do not report usage
fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Real completion adapter backed by an external command
#[derive(Debug, Clone)]
pub struct CommandCompletion {
    program: String,
    args: Vec<String>,
    default_model: String,
    default_timeout: Duration,
}

impl CommandCompletion {
    pub fn new(program: impl Into<String>, args: Vec<String>, default_model: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args,
            default_model: default_model.into(),
            default_timeout: Duration::from_secs(600),
        }
    }

    /// Deadline used when a request carries none
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    fn command(&self, request: &CompletionRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env(
                "CONVOKE_MODEL",
                request.model.as_deref().unwrap_or(&self.default_model),
            )
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(system) = &request.system_instruction {
            cmd.env("CONVOKE_SYSTEM_INSTRUCTION", system);
        }
        if let Some(temperature) = request.temperature {
            cmd.env("CONVOKE_TEMPERATURE", temperature.to_string());
        }
        if let Some(tokens) = request.max_output_tokens {
            cmd.env("CONVOKE_MAX_OUTPUT_TOKENS", tokens.to_string());
        }
        cmd
    }

    async fn run(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let mut child = self.command(request).spawn().map_err(|e| {
            CompletionError::Upstream(format!("Failed to spawn {}: {}", self.program, e))
        })?;

        // The prompt is fed while output is drained; a child that answers as it
        // reads would otherwise block on a full stdout pipe. Dropping stdin at
        // the end of the feed closes the child's input.
        let stdin = child.stdin.take();
        let prompt = request.prompt.as_bytes();
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(prompt).await {
                Ok(()) => Ok(()),
                // Programs that ignore stdin may exit before the prompt is written
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!("{} closed stdin early", self.program);
                    Ok(())
                }
                Err(e) => Err(CompletionError::Upstream(format!(
                    "Failed to write prompt: {}",
                    e
                ))),
            }
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output
            .map_err(|e| CompletionError::Upstream(format!("Failed to wait for {}: {}", self.program, e)))?;
        fed?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CompletionError::Upstream(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map(|s| s.trim().to_string())
            .map_err(|e| CompletionError::Parse(format!("Output is not UTF-8: {}", e)))
    }
}

#[async_trait]
impl CompletionPort for CommandCompletion {
    #[instrument(skip(self, request), fields(program = %self.program, model = ?request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, CompletionError> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let started = Instant::now();
        debug!("Submitting {} char prompt", request.prompt.len());

        // Dropping the future on expiry drops the child, which kills it
        let text = match tokio::time::timeout(timeout, self.run(&request)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Completion command timed out after {:?}", timeout);
                return Err(CompletionError::Timeout(timeout));
            }
        };

        Ok(Completion {
            usage: Usage::new(estimate_tokens(&request.prompt), estimate_tokens(&text)),
            text,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echoes_stdout() {
        let port = CommandCompletion::new("cat", vec![], "test-model");
        let completion = port
            .complete(CompletionRequest::new("  the answer is 42\n"))
            .await
            .unwrap();
        assert_eq!(completion.text, "the answer is 42");
        assert_eq!(completion.usage.total_tokens, completion.usage.prompt_tokens + completion.usage.response_tokens);
    }

    #[tokio::test]
    async fn test_prompt_larger_than_pipe_buffer() {
        let prompt = "x".repeat(1_000_000);
        let port = CommandCompletion::new("cat", vec![], "test-model");
        let completion = port
            .complete(CompletionRequest::new(prompt.clone()).with_timeout(Duration::from_secs(20)))
            .await
            .unwrap();
        assert_eq!(completion.text.len(), prompt.len());
    }

    #[tokio::test]
    async fn test_passes_parameters_as_env() {
        let port = CommandCompletion::new(
            "sh",
            vec!["-c".into(), "echo \"$CONVOKE_MODEL $CONVOKE_TEMPERATURE $CONVOKE_MAX_OUTPUT_TOKENS\"".into()],
            "default-model",
        );
        let completion = port
            .complete(
                CompletionRequest::new("ignored")
                    .with_temperature(0.7)
                    .with_max_output_tokens(256),
            )
            .await
            .unwrap();
        assert_eq!(completion.text, "default-model 0.7 256");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_upstream_error() {
        let port = CommandCompletion::new("sh", vec!["-c".into(), "echo nope >&2; exit 3".into()], "m");
        let err = port.complete(CompletionRequest::new("x")).await.unwrap_err();
        match err {
            CompletionError::Upstream(msg) => assert!(msg.contains("nope")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let port = CommandCompletion::new("sleep", vec!["5".into()], "m");
        let err = port
            .complete(CompletionRequest::new("").with_timeout(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert_eq!(err, CompletionError::Timeout(Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let port = CommandCompletion::new("convoke-no-such-binary", vec![], "m");
        let err = port.complete(CompletionRequest::new("x")).await.unwrap_err();
        assert!(matches!(err, CompletionError::Upstream(_)));
    }
}
