//! Scripted completion port for tests and dry runs

use async_trait::async_trait;
use convoke_core::CompletionError;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::completion::{Completion, CompletionPort, CompletionRequest, Usage};

#[derive(Debug, Clone)]
struct Scripted {
    reply: Result<String, CompletionError>,
    delay: Option<Duration>,
}

/// Replays queued replies in order and records every request it receives
///
/// When the queue is empty the fallback reply is returned if one was set,
/// otherwise an upstream error.
#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Scripted>>,
    fallback: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()), None);
        self
    }

    /// Queue a reply delivered after `delay`
    pub fn with_delayed_reply(self, text: impl Into<String>, delay: Duration) -> Self {
        self.push(Ok(text.into()), Some(delay));
        self
    }

    /// Queue a failure
    pub fn with_error(self, error: CompletionError) -> Self {
        self.push(Err(error), None);
        self
    }

    /// Reply used once the queue is exhausted
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    pub fn push(&self, reply: Result<String, CompletionError>, delay: Option<Duration>) {
        lock(&self.replies).push_back(Scripted { reply, delay });
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Replies still queued
    pub fn remaining(&self) -> usize {
        lock(&self.replies).len()
    }
}

#[async_trait]
impl CompletionPort for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, CompletionError> {
        let prompt_tokens = request.prompt.len() / 4;
        lock(&self.requests).push(request);

        let next = lock(&self.replies).pop_front();
        let scripted = match next {
            Some(scripted) => scripted,
            None => match &self.fallback {
                Some(text) => Scripted {
                    reply: Ok(text.clone()),
                    delay: None,
                },
                None => {
                    return Err(CompletionError::Upstream(
                        "No scripted reply left".to_string(),
                    ))
                }
            },
        };

        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }

        let text = scripted.reply?;
        Ok(Completion {
            usage: Usage::new(prompt_tokens, text.len() / 4),
            text,
            elapsed_ms: scripted.delay.map(|d| d.as_millis() as u64).unwrap_or(0),
        })
    }
}
