use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::{ AssistantBackend, BackendError, ContentBlock, Run, RunStatus, TextContent, ThreadMessage };
use crate::models::chat::Role;

/// The external call an [`EchoAssistant`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CreateThread,
    AddMessage,
    CreateRun,
    RetrieveRun,
    ListMessages,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub create_thread: usize,
    pub add_message: usize,
    pub create_run: usize,
    pub retrieve_run: usize,
    pub list_messages: usize,
    pub cancel_run: usize,
}

struct RunState {
    thread_id: String,
    polls: usize,
    status: RunStatus,
}

#[derive(Default)]
struct State {
    // oldest first
    threads: HashMap<String, Vec<ThreadMessage>>,
    runs: HashMap<String, RunState>,
    calls: CallCounts,
}

/// In-process assistant that answers `echo:<last user message>`.
///
/// Runs finish after a fixed number of status polls. Used for local
/// development without credentials and as the scripted service in tests.
pub struct EchoAssistant {
    polls_to_finish: Option<usize>,
    final_status: RunStatus,
    fail_at: Option<Stage>,
    write_reply: bool,
    state: Mutex<State>,
}

impl Default for EchoAssistant {
    fn default() -> Self {
        Self::new()
    }
}

impl EchoAssistant {
    pub fn new() -> Self {
        Self {
            polls_to_finish: Some(1),
            final_status: RunStatus::Completed,
            fail_at: None,
            write_reply: true,
            state: Mutex::new(State::default()),
        }
    }

    /// Runs reach their final status on the `n`th poll.
    pub fn with_polls(mut self, n: usize) -> Self {
        self.polls_to_finish = Some(n.max(1));
        self
    }

    /// Runs stay `in_progress` forever.
    pub fn never_finishing(mut self) -> Self {
        self.polls_to_finish = None;
        self
    }

    pub fn ending_with(mut self, status: RunStatus) -> Self {
        self.final_status = status;
        self
    }

    pub fn failing_at(mut self, stage: Stage) -> Self {
        self.fail_at = Some(stage);
        self
    }

    /// Completed runs leave no assistant message behind.
    pub fn without_reply(mut self) -> Self {
        self.write_reply = false;
        self
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    /// Appends an assistant message directly, as if produced by an earlier run.
    pub fn seed_assistant_message(&self, thread_id: &str, content: &str) {
        let mut state = self.lock();
        state.threads
            .entry(thread_id.to_string())
            .or_default()
            .push(text_message(Role::Assistant, content, None));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, stage: Stage) -> Result<(), BackendError> {
        if self.fail_at == Some(stage) {
            return Err(BackendError::Unavailable(format!("{:?} failed", stage)));
        }
        Ok(())
    }
}

fn text_message(role: Role, content: &str, run_id: Option<String>) -> ThreadMessage {
    ThreadMessage {
        id: format!("msg_{}", Uuid::new_v4().simple()),
        role,
        content: vec![ContentBlock::Text {
            text: TextContent { value: content.to_string() },
        }],
        run_id,
    }
}

fn not_found(kind: &str, id: &str) -> BackendError {
    BackendError::Api {
        status: 404,
        message: format!("No {} found with id '{}'.", kind, id),
    }
}

#[async_trait]
impl AssistantBackend for EchoAssistant {
    async fn create_thread(&self) -> Result<String, BackendError> {
        self.lock().calls.create_thread += 1;
        self.check(Stage::CreateThread)?;
        let id = format!("thread_{}", Uuid::new_v4().simple());
        self.lock().threads.insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn add_user_message(&self, thread_id: &str, content: &str) -> Result<(), BackendError> {
        self.lock().calls.add_message += 1;
        self.check(Stage::AddMessage)?;
        let mut state = self.lock();
        let thread = state.threads
            .get_mut(thread_id)
            .ok_or_else(|| not_found("thread", thread_id))?;
        thread.push(text_message(Role::User, content, None));
        Ok(())
    }

    async fn create_run(&self, thread_id: &str, _assistant_id: &str) -> Result<Run, BackendError> {
        self.lock().calls.create_run += 1;
        self.check(Stage::CreateRun)?;
        let mut state = self.lock();
        if !state.threads.contains_key(thread_id) {
            return Err(not_found("thread", thread_id));
        }
        let id = format!("run_{}", Uuid::new_v4().simple());
        state.runs.insert(id.clone(), RunState {
            thread_id: thread_id.to_string(),
            polls: 0,
            status: RunStatus::Queued,
        });
        Ok(Run { id, status: RunStatus::Queued })
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, BackendError> {
        self.lock().calls.retrieve_run += 1;
        self.check(Stage::RetrieveRun)?;

        let mut guard = self.lock();
        let state = &mut *guard;
        let run = state.runs
            .get_mut(run_id)
            .filter(|r| r.thread_id == thread_id)
            .ok_or_else(|| not_found("run", run_id))?;

        if run.status.is_terminal() {
            return Ok(Run { id: run_id.to_string(), status: run.status });
        }

        run.polls += 1;
        let finished = self.polls_to_finish.is_some_and(|n| run.polls >= n);
        if !finished {
            run.status = RunStatus::InProgress;
            return Ok(Run { id: run_id.to_string(), status: run.status });
        }

        run.status = self.final_status;
        debug!("Echo run {} finished as {} after {} polls", run_id, run.status, run.polls);

        if run.status.is_success() && self.write_reply {
            let thread = state.threads.entry(thread_id.to_string()).or_default();
            let last_user = thread
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .and_then(|m| m.first_text())
                .unwrap_or_default()
                .to_string();
            thread.push(
                text_message(
                    Role::Assistant,
                    &format!("echo:{}", last_user),
                    Some(run_id.to_string())
                )
            );
        }

        Ok(Run { id: run_id.to_string(), status: run.status })
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, BackendError> {
        self.lock().calls.list_messages += 1;
        self.check(Stage::ListMessages)?;
        let state = self.lock();
        let thread = state.threads.get(thread_id).ok_or_else(|| not_found("thread", thread_id))?;
        Ok(thread.iter().rev().cloned().collect())
    }

    async fn cancel_run(&self, _thread_id: &str, run_id: &str) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.calls.cancel_run += 1;
        if let Some(run) = state.runs.get_mut(run_id) {
            if !run.status.is_terminal() {
                run.status = RunStatus::Cancelled;
            }
        }
        Ok(())
    }
}
