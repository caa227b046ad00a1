use serde::{ Deserialize, Serialize };
use std::error::Error;
use std::fs;
use std::sync::Arc;
use log::info;

pub const DEFAULT_WELCOME_MESSAGE: &str = "¡Hola! Soy tu asistente. ¿En qué puedo ayudarte hoy?";
pub const DEFAULT_ERROR_MESSAGE: &str =
    "Disculpa, estoy teniendo dificultades. ¿Podrías intentarlo de nuevo?";

/// Copy strings and theme tokens for the chat widget.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WidgetConfig {
    pub page_title: String,
    pub main_heading: String,
    pub sub_heading: Option<String>,
    pub input_placeholder: String,
    pub submit_button_text: String,
    pub welcome_message: String,
    pub error_message: String,
    pub css_config: CssConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CssConfig {
    pub primary_color: String,
    pub secondary_color: String,
    pub message_radius: String,
    pub input_radius: String,
    pub chat_width: String,
    pub chat_height: String,
    pub font_family: String,
    pub font_size: String,
    pub show_typing_indicator: bool,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            page_title: "Chatbot".to_string(),
            main_heading: "Chatbot".to_string(),
            sub_heading: None,
            input_placeholder: "Escribe tu mensaje aquí...".to_string(),
            submit_button_text: "Enviar".to_string(),
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
            css_config: CssConfig::default(),
        }
    }
}

impl Default for CssConfig {
    fn default() -> Self {
        Self {
            primary_color: "#2563eb".to_string(),
            secondary_color: "#1e40af".to_string(),
            message_radius: "12px".to_string(),
            input_radius: "8px".to_string(),
            chat_width: "800px".to_string(),
            chat_height: "600px".to_string(),
            font_family: "system-ui, sans-serif".to_string(),
            font_size: "16px".to_string(),
            show_typing_indicator: true,
        }
    }
}

pub fn load_widget_config(path: &str) -> Result<Arc<WidgetConfig>, Box<dyn Error + Send + Sync>> {
    let file_content = fs
        ::read_to_string(path)
        .map_err(|e| format!("Failed to read widget config file '{}': {}", path, e))?;
    let config = parse_widget_config(&file_content).map_err(|e|
        format!("Failed to parse widget config file '{}': {}", path, e)
    )?;
    info!("Loaded widget config from {}", path);
    Ok(Arc::new(config))
}

/// Blank copy strings fall back to the defaults.
pub fn parse_widget_config(json: &str) -> Result<WidgetConfig, serde_json::Error> {
    let mut config: WidgetConfig = serde_json::from_str(json)?;
    let defaults = WidgetConfig::default();
    if config.welcome_message.trim().is_empty() {
        config.welcome_message = defaults.welcome_message;
    }
    if config.error_message.trim().is_empty() {
        config.error_message = defaults.error_message;
    }
    Ok(config)
}

pub fn resolve_widget_config(
    path: Option<&str>
) -> Result<Arc<WidgetConfig>, Box<dyn Error + Send + Sync>> {
    match path {
        Some(p) if !p.trim().is_empty() => load_widget_config(p),
        _ => Ok(Arc::new(WidgetConfig::default())),
    }
}
