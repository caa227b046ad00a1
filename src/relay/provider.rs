use log::{ error, info };
use std::sync::Arc;

use super::RelayError;
use crate::assistant::AssistantBackend;

/// Hands out new conversation handles.
pub struct ThreadProvider {
    backend: Arc<dyn AssistantBackend>,
}

impl ThreadProvider {
    pub fn new(backend: Arc<dyn AssistantBackend>) -> Self {
        Self { backend }
    }

    pub async fn start_conversation(&self) -> Result<String, RelayError> {
        match self.backend.create_thread().await {
            Ok(thread_id) => {
                info!("Started conversation thread {}", thread_id);
                Ok(thread_id)
            }
            Err(e) => {
                error!("Failed to create conversation thread: {}", e);
                Err(RelayError::Init(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::echo::{ EchoAssistant, Stage };

    #[tokio::test]
    async fn each_call_creates_a_new_thread() {
        let provider = ThreadProvider::new(Arc::new(EchoAssistant::new()));
        let a = provider.start_conversation().await.unwrap();
        let b = provider.start_conversation().await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn backend_failure_is_init_error() {
        let provider = ThreadProvider::new(
            Arc::new(EchoAssistant::new().failing_at(Stage::CreateThread))
        );
        let err = provider.start_conversation().await.unwrap_err();
        assert!(matches!(err, RelayError::Init(_)));
    }
}
