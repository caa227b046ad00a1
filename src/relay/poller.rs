use log::{ debug, warn };
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{ sleep, Instant };

use super::RelayError;
use crate::assistant::{ AssistantBackend, Run, RunStatus };

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_RUN_TIMEOUT,
        }
    }
}

pub struct RunPoller {
    backend: Arc<dyn AssistantBackend>,
    policy: PollPolicy,
}

impl RunPoller {
    pub fn new(backend: Arc<dyn AssistantBackend>, policy: PollPolicy) -> Self {
        Self { backend, policy }
    }

    /// Polls until the run completes. Every other terminal status, a run
    /// waiting on tool outputs, and running past the timeout are failures.
    pub async fn wait(&self, thread_id: &str, run_id: &str) -> Result<Run, RelayError> {
        let started = Instant::now();
        let mut polls = 0usize;

        loop {
            let run = self.backend
                .retrieve_run(thread_id, run_id).await
                .map_err(|source| RelayError::Poll {
                    thread_id: thread_id.to_string(),
                    run_id: run_id.to_string(),
                    source,
                })?;
            polls += 1;
            debug!("Run {} on thread {} is {} (poll {})", run_id, thread_id, run.status, polls);

            if run.status.is_success() {
                return Ok(run);
            }
            if run.status.is_terminal() {
                return Err(RelayError::RunFailed {
                    thread_id: thread_id.to_string(),
                    run_id: run_id.to_string(),
                    status: run.status,
                });
            }
            if run.status == RunStatus::RequiresAction {
                self.cancel(thread_id, run_id).await;
                return Err(RelayError::RunFailed {
                    thread_id: thread_id.to_string(),
                    run_id: run_id.to_string(),
                    status: run.status,
                });
            }
            if started.elapsed() + self.policy.interval > self.policy.timeout {
                self.cancel(thread_id, run_id).await;
                return Err(RelayError::Timeout {
                    thread_id: thread_id.to_string(),
                    run_id: run_id.to_string(),
                    timeout: self.policy.timeout,
                });
            }

            sleep(self.policy.interval).await;
        }
    }

    async fn cancel(&self, thread_id: &str, run_id: &str) {
        if let Err(e) = self.backend.cancel_run(thread_id, run_id).await {
            warn!("Failed to cancel run {} on thread {}: {}", run_id, thread_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::echo::{ EchoAssistant, Stage };

    fn fast() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(2),
            timeout: Duration::from_millis(500),
        }
    }

    async fn started_run(echo: &EchoAssistant) -> (String, String) {
        let thread = echo.create_thread().await.unwrap();
        echo.add_user_message(&thread, "hi").await.unwrap();
        let run = echo.create_run(&thread, "asst").await.unwrap();
        (thread, run.id)
    }

    #[tokio::test]
    async fn waits_for_exactly_n_polls() {
        let echo = Arc::new(EchoAssistant::new().with_polls(4));
        let (thread, run_id) = started_run(&echo).await;
        let poller = RunPoller::new(echo.clone(), fast());

        let run = poller.wait(&thread, &run_id).await.unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(echo.calls().retrieve_run, 4);
    }

    #[tokio::test]
    async fn failed_terminal_status_stops_the_loop() {
        let echo = Arc::new(EchoAssistant::new().with_polls(2).ending_with(RunStatus::Failed));
        let (thread, run_id) = started_run(&echo).await;
        let poller = RunPoller::new(echo.clone(), fast());

        let err = poller.wait(&thread, &run_id).await.unwrap_err();
        assert!(matches!(err, RelayError::RunFailed { status: RunStatus::Failed, .. }));
        assert_eq!(echo.calls().retrieve_run, 2);
    }

    #[tokio::test]
    async fn requires_action_is_cancelled_and_fails() {
        let echo = Arc::new(EchoAssistant::new().ending_with(RunStatus::RequiresAction));
        let (thread, run_id) = started_run(&echo).await;
        let poller = RunPoller::new(echo.clone(), fast());

        let err = poller.wait(&thread, &run_id).await.unwrap_err();
        assert!(matches!(err, RelayError::RunFailed { status: RunStatus::RequiresAction, .. }));
        assert_eq!(echo.calls().cancel_run, 1);
    }

    #[tokio::test]
    async fn stalled_run_times_out_and_is_cancelled() {
        let echo = Arc::new(EchoAssistant::new().never_finishing());
        let (thread, run_id) = started_run(&echo).await;
        let poller = RunPoller::new(echo.clone(), PollPolicy {
            interval: Duration::from_millis(5),
            timeout: Duration::from_millis(40),
        });

        let err = poller.wait(&thread, &run_id).await.unwrap_err();
        assert!(matches!(err, RelayError::Timeout { .. }));
        assert!(echo.calls().retrieve_run >= 1);
        assert_eq!(echo.calls().cancel_run, 1);
    }

    #[tokio::test]
    async fn poll_error_propagates() {
        let echo = Arc::new(EchoAssistant::new().failing_at(Stage::RetrieveRun));
        let (thread, run_id) = started_run(&echo).await;
        let poller = RunPoller::new(echo.clone(), fast());

        let err = poller.wait(&thread, &run_id).await.unwrap_err();
        assert!(matches!(err, RelayError::Poll { .. }));
    }
}
