mod error;
pub mod extractor;
pub mod guard;
pub mod poller;
pub mod provider;

pub use error::RelayError;

use log::{ debug, info, warn };
use std::sync::Arc;
use uuid::Uuid;

use self::extractor::ReplyExtractor;
use self::guard::RunGuard;
use self::poller::{ PollPolicy, RunPoller };
use crate::assistant::AssistantBackend;

/// Submit, run, poll, extract.
pub struct MessageRelay {
    backend: Arc<dyn AssistantBackend>,
    assistant_id: String,
    poller: RunPoller,
    extractor: ReplyExtractor,
    guard: RunGuard,
}

impl MessageRelay {
    pub fn new(
        backend: Arc<dyn AssistantBackend>,
        assistant_id: impl Into<String>,
        policy: PollPolicy
    ) -> Self {
        Self {
            poller: RunPoller::new(backend.clone(), policy),
            extractor: ReplyExtractor::new(backend.clone()),
            backend,
            assistant_id: assistant_id.into(),
            guard: RunGuard::new(),
        }
    }

    pub fn guard(&self) -> &RunGuard {
        &self.guard
    }

    /// Relays one user message and returns the assistant's reply text.
    ///
    /// The message stays in the remote thread even when a later stage fails.
    pub async fn relay(&self, thread_id: &str, message: &str) -> Result<String, RelayError> {
        let thread_id = thread_id.trim();
        if thread_id.is_empty() {
            return Err(RelayError::MissingConversation);
        }
        if message.trim().is_empty() {
            return Err(RelayError::EmptyMessage);
        }

        let permit = match self.guard.try_acquire(thread_id) {
            Some(permit) => permit,
            None => {
                warn!(
                    "Rejected message for thread {}: run {:?} still in flight",
                    thread_id,
                    self.guard.active_run(thread_id)
                );
                return Err(RelayError::RunInFlight(thread_id.to_string()));
            }
        };

        let request_id = Uuid::new_v4();
        debug!("[{}] Submitting message to thread {}", request_id, thread_id);
        self.backend
            .add_user_message(thread_id, message).await
            .map_err(|source| RelayError::Submission {
                thread_id: thread_id.to_string(),
                source,
            })?;

        let run = self.backend
            .create_run(thread_id, &self.assistant_id).await
            .map_err(|source| RelayError::RunStart {
                thread_id: thread_id.to_string(),
                source,
            })?;
        permit.bind_run(&run.id);
        debug!("[{}] Started run {} on thread {}", request_id, run.id, thread_id);

        let run = self.poller.wait(thread_id, &run.id).await?;
        let reply = self.extractor.extract(thread_id).await?;

        // The newest assistant message is taken as the reply even if another
        // run wrote it.
        if let Some(origin) = reply.run_id.as_deref() {
            if origin != run.id {
                warn!(
                    "[{}] Reply {} on thread {} came from run {}, expected {}",
                    request_id,
                    reply.message_id,
                    thread_id,
                    origin,
                    run.id
                );
            }
        }

        info!("[{}] Run {} on thread {} completed", request_id, run.id, thread_id);
        Ok(reply.text)
    }
}
