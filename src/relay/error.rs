use std::time::Duration;
use thiserror::Error;

use crate::assistant::{ BackendError, RunStatus };

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("could not create conversation thread: {0}")]
    Init(#[source] BackendError),

    #[error("could not add message to thread {thread_id}: {source}")]
    Submission {
        thread_id: String,
        #[source]
        source: BackendError,
    },

    #[error("could not start run on thread {thread_id}: {source}")]
    RunStart {
        thread_id: String,
        #[source]
        source: BackendError,
    },

    #[error("could not poll run {run_id} on thread {thread_id}: {source}")]
    Poll {
        thread_id: String,
        run_id: String,
        #[source]
        source: BackendError,
    },

    #[error("run {run_id} on thread {thread_id} ended with status {status}")]
    RunFailed {
        thread_id: String,
        run_id: String,
        status: RunStatus,
    },

    #[error("run {run_id} on thread {thread_id} did not finish within {timeout:?}")]
    Timeout {
        thread_id: String,
        run_id: String,
        timeout: Duration,
    },

    #[error("could not list messages of thread {thread_id}: {source}")]
    History {
        thread_id: String,
        #[source]
        source: BackendError,
    },

    #[error("thread {0} has no assistant reply")]
    NoReply(String),

    #[error("a conversation thread id is required")]
    MissingConversation,

    #[error("message is empty")]
    EmptyMessage,

    #[error("thread {0} already has a run in flight")]
    RunInFlight(String),
}
