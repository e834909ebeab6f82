//! Core configuration structures for the order dispatch service

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server and logging
    #[serde(default)]
    pub server: ServerConfig,

    /// Record store backend
    #[serde(default)]
    pub store: StoreConfig,

    /// Dispatch rules
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Outbound notifications
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Drivers that receive new-order broadcasts
    #[serde(default)]
    pub drivers: Vec<DriverEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,

    /// Expose `/metrics`
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Record store backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Database file, required by the sqlite backend
    #[serde(default)]
    pub path: Option<String>,

    /// Total attempts for a table read, including the first
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,

    #[serde(default = "default_retry_initial_ms")]
    pub retry_initial_ms: u64,

    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,
}

impl StoreConfig {
    pub fn retry_initial_delay(&self) -> Duration {
        Duration::from_millis(self.retry_initial_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Orders within one calendar month that make a customer loyal
    #[serde(default = "default_loyalty_threshold")]
    pub loyalty_threshold: u64,
}

/// Notification transports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    /// Write notifications to the log
    #[default]
    Log,
    /// POST notifications to a messaging gateway
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub kind: NotifierKind,

    /// Gateway URL, required by the webhook notifier
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_notify_timeout_ms")]
    pub timeout_ms: u64,
}

impl NotifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverEntry {
    pub phone: String,
    #[serde(default)]
    pub name: String,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_read_retries() -> u32 {
    3
}

fn default_retry_initial_ms() -> u64 {
    100
}

fn default_retry_max_ms() -> u64 {
    2000
}

fn default_loyalty_threshold() -> u64 {
    5
}

fn default_notify_timeout_ms() -> u64 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: default_true(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: None,
            read_retries: default_read_retries(),
            retry_initial_ms: default_retry_initial_ms(),
            retry_max_ms: default_retry_max_ms(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            loyalty_threshold: default_loyalty_threshold(),
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            kind: NotifierKind::Log,
            endpoint: None,
            timeout_ms: default_notify_timeout_ms(),
        }
    }
}
