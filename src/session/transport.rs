use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::error::Error;
use std::sync::Arc;

use crate::models::api::{ ChatReply, ChatRequest, ErrorBody, InitThreadResponse };
use crate::relay::MessageRelay;
use crate::relay::provider::ThreadProvider;

/// How a session reaches the relay.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn init_thread(&self) -> Result<String, Box<dyn Error + Send + Sync>>;

    async fn send(
        &self,
        thread_id: &str,
        message: &str
    ) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// Calls the relay in-process.
pub struct DirectTransport {
    provider: Arc<ThreadProvider>,
    relay: Arc<MessageRelay>,
}

impl DirectTransport {
    pub fn new(provider: Arc<ThreadProvider>, relay: Arc<MessageRelay>) -> Self {
        Self { provider, relay }
    }
}

#[async_trait]
impl ChatTransport for DirectTransport {
    async fn init_thread(&self) -> Result<String, Box<dyn Error + Send + Sync>> {
        Ok(self.provider.start_conversation().await?)
    }

    async fn send(
        &self,
        thread_id: &str,
        message: &str
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        Ok(self.relay.relay(thread_id, message).await?)
    }
}

/// Talks to a relay server over its JSON API.
pub struct HttpTransport {
    http: HttpClient,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn init_thread(&self) -> Result<String, Box<dyn Error + Send + Sync>> {
        let resp = self.http.get(format!("{}/api/init-thread", self.base_url)).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.json::<ErrorBody>().await.map(|b| b.error).unwrap_or_default();
            return Err(format!("init-thread failed with {}: {}", status, body).into());
        }
        let data: InitThreadResponse = resp.json().await?;
        Ok(data.thread_id)
    }

    async fn send(
        &self,
        thread_id: &str,
        message: &str
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let req = ChatRequest {
            message: message.to_string(),
            thread_id: Some(thread_id.to_string()),
        };
        let resp = self.http.post(format!("{}/api/chat", self.base_url)).json(&req).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.json::<ErrorBody>().await.map(|b| b.error).unwrap_or_default();
            return Err(format!("chat failed with {}: {}", status, body).into());
        }
        let data: ChatReply = resp.json().await?;
        Ok(data.reply)
    }
}
