use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config/chat.json";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_CHAT_SERVICE_BASE: &str = "wss://chat.mababa.app/ws";

pub const API_URL_ENV: &str = "COMPLAINT_CHAT_API_URL";
pub const CHAT_SERVICE_ENV: &str = "COMPLAINT_CHAT_WS_URL";

/// Whether server echoes of our own messages confirm pending echoes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EchoReconciliation {
    /// Echoes are shown as ordinary received messages.
    #[default]
    Off,
    /// An echo matching the oldest pending message confirms it instead.
    ConfirmPending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_chat_service_base")]
    pub chat_service_base: String,
    #[serde(default)]
    pub echo_reconciliation: EchoReconciliation,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_chat_service_base() -> String {
    DEFAULT_CHAT_SERVICE_BASE.to_string()
}

fn default_channel_capacity() -> usize {
    100
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            chat_service_base: default_chat_service_base(),
            echo_reconciliation: EchoReconciliation::default(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl AppConfig {
    /// Override endpoints from the environment (after `.env` is loaded).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|value| !value.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(url) = lookup(CHAT_SERVICE_ENV).filter(|value| !value.trim().is_empty()) {
            self.chat_service_base = url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(ChatError::InvalidConfig("api_base_url is empty".to_string()));
        }
        if self.chat_service_base.trim().is_empty() {
            return Err(ChatError::InvalidConfig("chat_service_base is empty".to_string()));
        }
        if self.channel_capacity == 0 {
            return Err(ChatError::InvalidConfig(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

pub fn save_config(path: &str, config: &AppConfig) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)
}
