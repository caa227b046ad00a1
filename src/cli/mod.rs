use clap::{ Parser, Subcommand };
use std::time::Duration;

use crate::assistant::{ AssistantConfig, BackendType };
use crate::relay::poller::PollPolicy;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    // --- Assistant Service Args ---
    /// Assistant backend (openai, echo). `echo` needs no credentials.
    #[arg(long, env = "ASSISTANT_BACKEND", default_value = "openai")]
    pub backend: String,

    /// API key for the hosted assistant service
    #[arg(long, env = "OPENAI_API_KEY", default_value = "", hide_env_values = true)]
    pub api_key: String,

    /// Assistant configuration every run is bound to (e.g., asst_abc123)
    #[arg(long, env = "ASSISTANT_ID", default_value = "")]
    pub assistant_id: String,

    /// Base URL of the assistant API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub base_url: String,

    /// Timeout in seconds for each call to the assistant API
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub request_timeout_secs: u64,

    // --- Relay Args ---
    /// Milliseconds between run status polls
    #[arg(long, env = "POLL_INTERVAL_MS", default_value = "1000")]
    pub poll_interval_ms: u64,

    /// Seconds a run may take before the relay gives up on it
    #[arg(long, env = "RUN_TIMEOUT_SECS", default_value = "60")]
    pub run_timeout_secs: u64,

    // --- General App Args ---
    /// Path to the widget copy/theme JSON file. Built-in defaults when unset.
    #[arg(long, env = "WIDGET_CONFIG_PATH")]
    pub widget_config_path: Option<String>,

    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3000")]
    pub server_addr: String,

    /// Requests per second accepted across all clients.
    #[arg(long, env = "RATE_LIMIT_PER_SECOND", default_value = "10")]
    pub rate_limit_per_second: u32,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Serve the chat API (default)
    Serve,
    /// Chat from the terminal through a running server
    Chat {
        /// Base URL of the relay server
        #[arg(long, env = "RELAY_URL", default_value = "http://127.0.0.1:3000")]
        server_url: String,
    },
}

impl Args {
    pub fn assistant_config(&self) -> Result<AssistantConfig, String> {
        let backend: BackendType = self.backend.parse().map_err(|e| format!("{}", e))?;
        Ok(AssistantConfig {
            backend,
            api_key: Some(self.api_key.clone()).filter(|k| !k.is_empty()),
            assistant_id: self.assistant_id.clone(),
            base_url: self.base_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            timeout: Duration::from_secs(self.run_timeout_secs),
        }
    }
}
