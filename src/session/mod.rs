pub mod transcript;
pub mod transport;

use log::{ error, info, warn };
use std::sync::{ Mutex, MutexGuard };
use thiserror::Error;

use self::transcript::{ OptimisticTranscript, Transcript };
use self::transport::ChatTransport;
use crate::config::widget::WidgetConfig;
use crate::models::chat::ChatMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    /// A conversation handle is being requested.
    Initializing,
    /// Conversation init failed; nothing can be submitted.
    Unavailable,
    Ready {
        thread_id: String,
    },
    Awaiting {
        thread_id: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitRejected {
    #[error("message is empty")]
    EmptyInput,
    #[error("a reply is still pending")]
    Busy,
    #[error("no conversation is available")]
    NotReady,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Replied(String),
    /// The relay failed and the fallback text was shown instead.
    Failed,
}

struct Inner {
    state: SessionState,
    transcript: Box<dyn Transcript>,
}

/// One user's chat: local message list plus the guard that keeps a single
/// relay call in flight.
pub struct ChatSession<T: ChatTransport> {
    transport: T,
    welcome_message: String,
    error_message: String,
    inner: Mutex<Inner>,
}

impl<T: ChatTransport> ChatSession<T> {
    pub fn new(transport: T, widget: &WidgetConfig) -> Self {
        Self::with_transcript(transport, widget, Box::new(OptimisticTranscript::new()))
    }

    pub fn with_transcript(
        transport: T,
        widget: &WidgetConfig,
        transcript: Box<dyn Transcript>
    ) -> Self {
        Self {
            transport,
            welcome_message: widget.welcome_message.clone(),
            error_message: widget.error_message.clone(),
            inner: Mutex::new(Inner {
                state: SessionState::Uninitialized,
                transcript,
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.lock().state, SessionState::Awaiting { .. })
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock().transcript.messages()
    }

    /// Obtains a conversation handle. Callable again after a failure; a call
    /// made while another is still initializing returns without a request.
    pub async fn start(&self) -> SessionState {
        {
            let mut inner = self.lock();
            if !matches!(inner.state, SessionState::Uninitialized | SessionState::Unavailable) {
                return inner.state.clone();
            }
            inner.state = SessionState::Initializing;
        }

        let result = self.transport.init_thread().await;

        let mut inner = self.lock();
        match result {
            Ok(thread_id) => {
                info!("Session ready on thread {}", thread_id);
                inner.transcript.append(ChatMessage::assistant(&self.welcome_message));
                inner.state = SessionState::Ready { thread_id };
            }
            Err(e) => {
                error!("Error initializing thread: {}", e);
                inner.transcript.append(ChatMessage::assistant(&self.error_message));
                inner.state = SessionState::Unavailable;
            }
        }
        inner.state.clone()
    }

    pub async fn submit(&self, input: &str) -> Result<SubmitOutcome, SubmitRejected> {
        if input.trim().is_empty() {
            return Err(SubmitRejected::EmptyInput);
        }

        let thread_id = {
            let mut inner = self.lock();
            let thread_id = match &inner.state {
                SessionState::Ready { thread_id } => thread_id.clone(),
                SessionState::Awaiting { .. } => {
                    return Err(SubmitRejected::Busy);
                }
                | SessionState::Uninitialized
                | SessionState::Initializing
                | SessionState::Unavailable => {
                    return Err(SubmitRejected::NotReady);
                }
            };
            inner.transcript.append(ChatMessage::user(input));
            inner.state = SessionState::Awaiting { thread_id: thread_id.clone() };
            thread_id
        };

        let result = self.transport.send(&thread_id, input).await;

        let mut inner = self.lock();
        inner.state = SessionState::Ready { thread_id };
        match result {
            Ok(reply) => {
                inner.transcript.append(ChatMessage::assistant(&reply));
                Ok(SubmitOutcome::Replied(reply))
            }
            Err(e) => {
                warn!("Relay failed, showing fallback message: {}", e);
                inner.transcript.append(ChatMessage::assistant(&self.error_message));
                Ok(SubmitOutcome::Failed)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::echo::{ EchoAssistant, Stage };
    use crate::assistant::AssistantBackend;
    use crate::models::chat::Role;
    use crate::relay::MessageRelay;
    use crate::relay::poller::PollPolicy;
    use crate::relay::provider::ThreadProvider;
    use std::sync::Arc;
    use std::time::Duration;
    use super::transport::DirectTransport;
    use async_trait::async_trait;
    use std::error::Error;
    use std::sync::atomic::{ AtomicUsize, Ordering };

    fn session_over(echo: Arc<EchoAssistant>) -> ChatSession<DirectTransport> {
        let backend: Arc<dyn AssistantBackend> = echo;
        let policy = PollPolicy {
            interval: Duration::from_millis(2),
            timeout: Duration::from_millis(500),
        };
        let transport = DirectTransport::new(
            Arc::new(ThreadProvider::new(backend.clone())),
            Arc::new(MessageRelay::new(backend, "asst_test", policy))
        );
        ChatSession::new(transport, &WidgetConfig::default())
    }

    fn contents(session: &ChatSession<DirectTransport>) -> Vec<(Role, String)> {
        contents_of(&session.messages())
    }

    fn contents_of(messages: &[ChatMessage]) -> Vec<(Role, String)> {
        messages
            .iter()
            .map(|m| (m.role, m.content.clone()))
            .collect()
    }

    #[tokio::test]
    async fn submit_appends_user_then_reply() {
        let session = session_over(Arc::new(EchoAssistant::new().with_polls(2)));
        assert!(matches!(session.start().await, SessionState::Ready { .. }));

        let outcome = session.submit("hi").await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Replied("echo:hi".to_string()));
        assert!(!session.is_loading());
        assert_eq!(contents(&session), vec![
            (Role::Assistant, WidgetConfig::default().welcome_message),
            (Role::User, "hi".to_string()),
            (Role::Assistant, "echo:hi".to_string()),
        ]);
    }

    #[tokio::test]
    async fn blank_input_never_reaches_the_relay() {
        let echo = Arc::new(EchoAssistant::new());
        let session = session_over(echo.clone());
        session.start().await;

        assert_eq!(session.submit("").await, Err(SubmitRejected::EmptyInput));
        assert_eq!(session.submit("  \t\n").await, Err(SubmitRejected::EmptyInput));
        assert_eq!(echo.calls().add_message, 0);
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn second_submit_while_awaiting_is_rejected() {
        let echo = Arc::new(EchoAssistant::new().with_polls(20));
        let session = session_over(echo.clone());
        session.start().await;

        let (first, second) = tokio::join!(session.submit("one"), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            session.submit("two").await
        });

        assert_eq!(first, Ok(SubmitOutcome::Replied("echo:one".to_string())));
        assert_eq!(second, Err(SubmitRejected::Busy));
        assert_eq!(echo.calls().create_run, 1);
        assert!(matches!(session.state(), SessionState::Ready { .. }));
    }

    #[tokio::test]
    async fn failed_submission_shows_fallback_once() {
        let session = session_over(Arc::new(EchoAssistant::new().failing_at(Stage::AddMessage)));
        session.start().await;

        let outcome = session.submit("hi").await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Failed);

        let defaults = WidgetConfig::default();
        assert_eq!(contents(&session), vec![
            (Role::Assistant, defaults.welcome_message),
            (Role::User, "hi".to_string()),
            (Role::Assistant, defaults.error_message),
        ]);
        assert!(matches!(session.state(), SessionState::Ready { .. }));
    }

    #[tokio::test]
    async fn failed_run_returns_to_ready_and_allows_resubmit() {
        let session = session_over(
            Arc::new(EchoAssistant::new().ending_with(crate::assistant::RunStatus::Failed))
        );
        session.start().await;

        assert_eq!(session.submit("hi").await, Ok(SubmitOutcome::Failed));
        assert_eq!(session.submit("again").await, Ok(SubmitOutcome::Failed));
        assert_eq!(session.messages().len(), 5);
    }

    #[tokio::test]
    async fn init_failure_leaves_session_unable_to_submit() {
        let echo = Arc::new(EchoAssistant::new().failing_at(Stage::CreateThread));
        let session = session_over(echo.clone());

        assert_eq!(session.start().await, SessionState::Unavailable);
        assert_eq!(contents(&session), vec![
            (Role::Assistant, WidgetConfig::default().error_message),
        ]);

        assert_eq!(session.submit("hello").await, Err(SubmitRejected::NotReady));
        assert_eq!(echo.calls().add_message, 0);
        assert_eq!(session.messages().len(), 1);
    }

    /// Hands out a thread only after yielding, like a real network call.
    struct SlowInit {
        inits: AtomicUsize,
    }

    #[async_trait]
    impl ChatTransport for SlowInit {
        async fn init_thread(&self) -> Result<String, Box<dyn Error + Send + Sync>> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok("thread_slow".to_string())
        }

        async fn send(
            &self,
            _thread_id: &str,
            message: &str
        ) -> Result<String, Box<dyn Error + Send + Sync>> {
            Ok(format!("echo:{}", message))
        }
    }

    #[tokio::test]
    async fn concurrent_start_creates_one_thread() {
        let session = ChatSession::new(
            SlowInit { inits: AtomicUsize::new(0) },
            &WidgetConfig::default()
        );

        let (first, second) = tokio::join!(session.start(), async {
            tokio::time::sleep(Duration::from_millis(2)).await;
            let state = session.state();
            (state, session.submit("early").await, session.start().await)
        });

        assert_eq!(first, SessionState::Ready { thread_id: "thread_slow".to_string() });
        assert_eq!(second.0, SessionState::Initializing);
        assert_eq!(second.1, Err(SubmitRejected::NotReady));
        assert_eq!(second.2, SessionState::Initializing);
        assert_eq!(session.transport.inits.load(Ordering::SeqCst), 1);
        assert_eq!(contents_of(&session.messages()), vec![
            (Role::Assistant, WidgetConfig::default().welcome_message),
        ]);
    }

    #[tokio::test]
    async fn submit_before_start_is_rejected() {
        let session = session_over(Arc::new(EchoAssistant::new()));
        assert_eq!(session.submit("hello").await, Err(SubmitRejected::NotReady));
        assert!(session.messages().is_empty());
    }
}
