use crate::models::chat::ChatMessage;

/// Local record of a conversation as shown to the user.
pub trait Transcript: Send {
    fn append(&mut self, message: ChatMessage);

    fn messages(&self) -> Vec<ChatMessage>;
}

/// Appends whatever it is given and never reconciles with the remote thread.
#[derive(Debug, Default, Clone)]
pub struct OptimisticTranscript {
    messages: Vec<ChatMessage>,
}

impl OptimisticTranscript {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transcript for OptimisticTranscript {
    fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    fn messages(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }
}
