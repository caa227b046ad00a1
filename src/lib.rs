pub mod assistant;
pub mod cli;
pub mod config;
pub mod models;
pub mod relay;
pub mod server;
pub mod session;
pub mod terminal;

use assistant::new_backend;
use cli::{ Args, Command };
use config::widget::{ resolve_widget_config, WidgetConfig };
use log::info;
use relay::MessageRelay;
use relay::provider::ThreadProvider;
use server::Server;
use server::api::AppState;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let widget = resolve_widget_config(args.widget_config_path.as_deref())?;

    match args.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(args, widget).await,
        Command::Chat { server_url } => terminal::run_chat(&server_url, &widget).await,
    }
}

async fn serve(args: Args, widget: Arc<WidgetConfig>) -> Result<(), Box<dyn Error + Send + Sync>> {
    let assistant_config = args.assistant_config()?;
    let policy = args.poll_policy();

    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Assistant Backend: {}", args.backend);
    info!("Assistant API Base URL: {}", assistant_config.base_url);
    info!("Assistant ID: {}", assistant_config.assistant_id);
    info!("API Key Set: {}", assistant_config.api_key.is_some());
    info!("Poll Interval: {:?}", policy.interval);
    info!("Run Timeout: {:?}", policy.timeout);
    info!("Request Timeout: {:?}", assistant_config.request_timeout);
    info!("Rate Limit: {}/s", args.rate_limit_per_second);
    info!("Widget Config: {}", args.widget_config_path.as_deref().unwrap_or("built-in defaults"));
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let backend = new_backend(&assistant_config)?;
    let provider = Arc::new(ThreadProvider::new(backend.clone()));
    let relay = Arc::new(MessageRelay::new(backend, assistant_config.assistant_id.clone(), policy));
    let state = AppState::new(provider, relay, widget, args.rate_limit_per_second);

    let server = Server::new(args.server_addr.clone(), state, args);
    server.run().await
}
