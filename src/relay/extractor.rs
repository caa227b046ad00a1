use std::sync::Arc;

use super::RelayError;
use crate::assistant::AssistantBackend;
use crate::models::chat::Role;

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub message_id: String,
    pub run_id: Option<String>,
}

/// Picks the newest assistant message of a thread.
///
/// Nothing ties the picked message to a particular run; callers that care
/// compare [`Reply::run_id`] themselves.
pub struct ReplyExtractor {
    backend: Arc<dyn AssistantBackend>,
}

impl ReplyExtractor {
    pub fn new(backend: Arc<dyn AssistantBackend>) -> Self {
        Self { backend }
    }

    pub async fn extract(&self, thread_id: &str) -> Result<Reply, RelayError> {
        let messages = self.backend
            .list_messages(thread_id).await
            .map_err(|source| RelayError::History {
                thread_id: thread_id.to_string(),
                source,
            })?;

        messages
            .into_iter()
            .find(|m| m.role == Role::Assistant)
            .and_then(|m| {
                let text = m.first_text()?.to_string();
                Some(Reply {
                    text,
                    message_id: m.id,
                    run_id: m.run_id,
                })
            })
            .ok_or_else(|| RelayError::NoReply(thread_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::echo::EchoAssistant;

    #[tokio::test]
    async fn picks_newest_assistant_message() {
        let echo = Arc::new(EchoAssistant::new());
        let thread = echo.create_thread().await.unwrap();
        echo.seed_assistant_message(&thread, "older");
        echo.seed_assistant_message(&thread, "newer");
        echo.add_user_message(&thread, "question").await.unwrap();

        let reply = ReplyExtractor::new(echo.clone()).extract(&thread).await.unwrap();
        assert_eq!(reply.text, "newer");
        assert_eq!(reply.run_id, None);
    }

    #[tokio::test]
    async fn extraction_is_idempotent() {
        let echo = Arc::new(EchoAssistant::new());
        let thread = echo.create_thread().await.unwrap();
        echo.seed_assistant_message(&thread, "bonjour");

        let extractor = ReplyExtractor::new(echo.clone());
        let first = extractor.extract(&thread).await.unwrap();
        let second = extractor.extract(&thread).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn thread_without_assistant_message_has_no_reply() {
        let echo = Arc::new(EchoAssistant::new());
        let thread = echo.create_thread().await.unwrap();
        echo.add_user_message(&thread, "anyone?").await.unwrap();

        let err = ReplyExtractor::new(echo.clone()).extract(&thread).await.unwrap_err();
        assert!(matches!(err, RelayError::NoReply(t) if t == thread));
    }
}
