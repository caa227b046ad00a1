pub mod echo;
pub mod openai;

use async_trait::async_trait;
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use self::echo::EchoAssistant;
use self::openai::OpenAIAssistantClient;
use crate::models::chat::Role;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("assistant API returned {status}: {message}")]
    Api {
        status: u16,
        message: String,
    },
    #[error("failed to decode assistant API response: {0}")]
    Decode(String),
    #[error("assistant backend unavailable: {0}")]
    Unavailable(String),
    #[error("invalid {kind} id '{id}'")]
    InvalidId {
        kind: &'static str,
        id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// No further transition happens from a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed |
                RunStatus::Cancelled |
                RunStatus::Failed |
                RunStatus::Incomplete |
                RunStatus::Expired
        )
    }

    pub fn is_success(self) -> bool {
        self == RunStatus::Completed
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Expired => "expired",
            RunStatus::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: TextContent,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub run_id: Option<String>,
}

impl ThreadMessage {
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| {
            match block {
                ContentBlock::Text { text } => Some(text.value.as_str()),
                ContentBlock::Other => None,
            }
        })
    }
}

/// The operations the hosted assistant service exposes for threads and runs.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    async fn create_thread(&self) -> Result<String, BackendError>;

    async fn add_user_message(&self, thread_id: &str, content: &str) -> Result<(), BackendError>;

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, BackendError>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, BackendError>;

    /// Messages of the thread, newest first.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, BackendError>;

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<(), BackendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    OpenAI,
    Echo,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseBackendTypeError {
    message: String,
}

impl fmt::Display for ParseBackendTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for ParseBackendTypeError {}

impl FromStr for BackendType {
    type Err = ParseBackendTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(BackendType::OpenAI),
            "echo" => Ok(BackendType::Echo),
            _ =>
                Err(ParseBackendTypeError {
                    message: format!("Invalid assistant backend: '{}'", s),
                }),
        }
    }
}

/// Credentials and endpoint of the hosted assistant service.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub backend: BackendType,
    pub api_key: Option<String>,
    pub assistant_id: String,
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::OpenAI,
            api_key: None,
            assistant_id: String::new(),
            base_url: openai::DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub fn new_backend(
    config: &AssistantConfig
) -> Result<Arc<dyn AssistantBackend>, Box<dyn StdError + Send + Sync>> {
    let backend: Arc<dyn AssistantBackend> = match config.backend {
        BackendType::OpenAI => {
            let client = OpenAIAssistantClient::from_config(config)?;
            Arc::new(client)
        }
        BackendType::Echo => Arc::new(EchoAssistant::new()),
    };
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_run_status_is_not_terminal() {
        let run: Run = serde_json::from_str(r#"{"id":"run_1","status":"paused"}"#).unwrap();
        assert_eq!(run.status, RunStatus::Unknown);
        assert!(!run.status.is_terminal());
    }

    #[test]
    fn only_completed_is_success() {
        for status in [
            RunStatus::Cancelled,
            RunStatus::Failed,
            RunStatus::Incomplete,
            RunStatus::Expired,
        ] {
            assert!(status.is_terminal());
            assert!(!status.is_success());
        }
        assert!(RunStatus::Completed.is_success());
    }

    #[test]
    fn first_text_skips_non_text_blocks() {
        let msg: ThreadMessage = serde_json
            ::from_str(
                r#"{
                    "id": "msg_1",
                    "role": "assistant",
                    "content": [
                        {"type": "image_file", "image_file": {"file_id": "f"}},
                        {"type": "text", "text": {"value": "hola", "annotations": []}}
                    ],
                    "run_id": "run_9"
                }"#
            )
            .unwrap();
        assert_eq!(msg.first_text(), Some("hola"));
        assert_eq!(msg.run_id.as_deref(), Some("run_9"));
    }

    #[test]
    fn backend_type_parses_case_insensitively() {
        assert_eq!("OpenAI".parse::<BackendType>(), Ok(BackendType::OpenAI));
        assert_eq!("echo".parse::<BackendType>(), Ok(BackendType::Echo));
        assert!("ollama".parse::<BackendType>().is_err());
    }
}
