use async_trait::async_trait;
use log::debug;
use reqwest::{ Client as HttpClient, Response, header::{ HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE } };
use serde::{ Deserialize, Serialize };
use serde::de::DeserializeOwned;
use std::error::Error as StdError;
use url::Url;

use super::{ AssistantBackend, AssistantConfig, BackendError, Run, ThreadMessage };

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const BETA_HEADER: &str = "openai-beta";
const BETA_VALUE: &str = "assistants=v2";

pub struct OpenAIAssistantClient {
    http: HttpClient,
    base_url: String,
}

#[derive(Deserialize)]
struct ThreadObject {
    id: String,
}

#[derive(Serialize)]
struct CreateMessageRequest<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a str,
}

#[derive(Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl OpenAIAssistantClient {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        request_timeout: std::time::Duration
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Url::parse(&base_url).map_err(|e|
            format!("Invalid assistant API base URL '{}': {}", base_url, e)
        )?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(BETA_HEADER, HeaderValue::from_static(BETA_VALUE));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e|
                format!("Invalid API key format: {}", e)
            )?
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &AssistantConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| "OpenAI API key is required".to_string())?;
        if config.assistant_id.trim().is_empty() {
            return Err("Assistant ID is required".into());
        }

        Self::new(api_key, Some(config.base_url.clone()), config.request_timeout)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Ids end up as URL path segments, so only the characters the service
    /// issues ids with are allowed.
    fn path_id<'a>(kind: &'static str, id: &'a str) -> Result<&'a str, BackendError> {
        let valid =
            !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(id)
        } else {
            Err(BackendError::InvalidId { kind, id: id.to_string() })
        }
    }

    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, BackendError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json
                ::from_str::<ApiErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AssistantBackend for OpenAIAssistantClient {
    async fn create_thread(&self) -> Result<String, BackendError> {
        let resp = self.http
            .post(self.url("/threads"))
            .json(&serde_json::json!({}))
            .send().await?;
        let thread: ThreadObject = Self::decode(resp).await?;
        debug!("Created thread {}", thread.id);
        Ok(thread.id)
    }

    async fn add_user_message(&self, thread_id: &str, content: &str) -> Result<(), BackendError> {
        let thread_id = Self::path_id("thread", thread_id)?;
        let resp = self.http
            .post(self.url(&format!("/threads/{}/messages", thread_id)))
            .json(&(CreateMessageRequest { role: "user", content }))
            .send().await?;
        let _: serde_json::Value = Self::decode(resp).await?;
        Ok(())
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, BackendError> {
        let thread_id = Self::path_id("thread", thread_id)?;
        let resp = self.http
            .post(self.url(&format!("/threads/{}/runs", thread_id)))
            .json(&(CreateRunRequest { assistant_id }))
            .send().await?;
        Self::decode(resp).await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, BackendError> {
        let thread_id = Self::path_id("thread", thread_id)?;
        let run_id = Self::path_id("run", run_id)?;
        let resp = self.http
            .get(self.url(&format!("/threads/{}/runs/{}", thread_id, run_id)))
            .send().await?;
        Self::decode(resp).await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, BackendError> {
        let thread_id = Self::path_id("thread", thread_id)?;
        let resp = self.http
            .get(self.url(&format!("/threads/{}/messages", thread_id)))
            .query(&[("order", "desc")])
            .send().await?;
        let list: MessageList = Self::decode(resp).await?;
        Ok(list.data)
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<(), BackendError> {
        let thread_id = Self::path_id("thread", thread_id)?;
        let run_id = Self::path_id("run", run_id)?;
        let resp = self.http
            .post(self.url(&format!("/threads/{}/runs/{}/cancel", thread_id, run_id)))
            .send().await?;
        let _: serde_json::Value = Self::decode(resp).await?;
        Ok(())
    }
}
