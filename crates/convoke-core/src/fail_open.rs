//! Fail-open utilities for graceful degradation
//!
//! Progress reporting is advisory: a sink that errors must never fail the
//! mission or debate it reports on.
//!
//! DO NOT use fail-open for:
//! - Completion calls (business logic)
//! - Record persistence (state)

use async_trait::async_trait;
use std::future::Future;
use tracing::warn;

use crate::Result;

/// Execute an operation that should fail open
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
///
/// # Usage
///
/// ```no_run
/// use convoke_core::fail_open::fail_open;
/// use convoke_core::Result;
///
/// async fn notify() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() {
///     let result = fail_open("progress", || notify()).await;
///     // result is None if notify() failed, otherwise Some(())
/// }
/// ```
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}

/// Receiver of `(fraction, message)` progress updates
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, fraction: f32, message: &str) -> Result<()>;
}

/// Report progress to an optional sink, ignoring sink failures
pub async fn report_progress(sink: Option<&dyn ProgressSink>, fraction: f32, message: &str) {
    if let Some(sink) = sink {
        let fraction = fraction.clamp(0.0, 1.0);
        fail_open("progress sink", || sink.report(fraction, message)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConvokeError;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_fail_open_success() {
        let result = fail_open("test_op", || async { Ok::<_, ConvokeError>(42) }).await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn test_fail_open_failure() {
        let result = fail_open("test_op", || async {
            Err::<i32, _>(ConvokeError::Other("boom".to_string()))
        })
        .await;
        assert_eq!(result, None);
    }

    struct Recording(Mutex<Vec<(f32, String)>>);

    #[async_trait]
    impl ProgressSink for Recording {
        async fn report(&self, fraction: f32, message: &str) -> Result<()> {
            self.0
                .lock()
                .unwrap()
                .push((fraction, message.to_string()));
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl ProgressSink for Broken {
        async fn report(&self, _fraction: f32, _message: &str) -> Result<()> {
            Err(ConvokeError::Other("sink closed".into()))
        }
    }

    #[tokio::test]
    async fn test_report_progress_clamps() {
        let sink = Recording(Mutex::new(Vec::new()));
        report_progress(Some(&sink), 1.7, "done").await;
        let seen = sink.0.lock().unwrap();
        assert_eq!(seen[0], (1.0, "done".to_string()));
    }

    #[tokio::test]
    async fn test_broken_sink_is_ignored() {
        report_progress(Some(&Broken), 0.5, "halfway").await;
        report_progress(None, 0.5, "nobody listening").await;
    }
}
