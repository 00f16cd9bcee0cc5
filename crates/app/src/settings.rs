//! Handles settings for the application. Configuration is written in
//! `settings.toml`, with `OUTLAY__`-prefixed environment overrides
//! (e.g. `OUTLAY__SERVER__PORT=8080`).

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub enum Database {
    #[serde(rename = "memory")]
    Memory,
    #[serde(rename = "sqlite")]
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
}

/// Advisory (AI) provider settings. Absent section disables the integration.
#[derive(Debug, Deserialize)]
pub struct Advisory {
    pub endpoint: String,
    pub api_key: Option<String>,
    #[serde(default = "default_advisory_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_advisory_timeout_ms() -> u64 {
    10_000
}

impl Advisory {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Webhook notification settings. Absent section drops notifications.
#[derive(Debug, Deserialize)]
pub struct Notifications {
    pub webhook_url: String,
    #[serde(default = "default_webhook_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_webhook_timeout_ms() -> u64 {
    5_000
}

impl Notifications {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub server: Option<Server>,
    pub advisory: Option<Advisory>,
    pub notifications: Option<Notifications>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("OUTLAY").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
