//! Configuration validation

use crate::{AppConfig, ConfigError, NotifierKind, Result, StoreBackend};
use std::collections::HashSet;

/// Validation error details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every problem found in `config`; empty when it is usable
pub fn collect_errors(config: &AppConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    // Server
    if let Err(e) = validate_log_level(&config.server.log_level) {
        errors.push(e);
    }

    if config.server.port == 0 {
        errors.push(ValidationError::new(
            "server.port",
            "port must be greater than 0",
        ));
    }

    if config.server.host.trim().is_empty() {
        errors.push(ValidationError::new("server.host", "host is required"));
    }

    // Store
    if config.store.backend == StoreBackend::Sqlite
        && config
            .store
            .path
            .as_deref()
            .map_or(true, |p| p.trim().is_empty())
    {
        errors.push(ValidationError::new(
            "store.path",
            "sqlite backend requires a database path",
        ));
    }

    if config.store.read_retries == 0 {
        errors.push(ValidationError::new(
            "store.read_retries",
            "must be at least 1",
        ));
    }

    if config.store.retry_initial_ms > config.store.retry_max_ms {
        errors.push(ValidationError::new(
            "store.retry_initial_ms",
            "must not exceed store.retry_max_ms",
        ));
    }

    // Dispatch
    if config.dispatch.loyalty_threshold == 0 {
        errors.push(ValidationError::new(
            "dispatch.loyalty_threshold",
            "must be at least 1",
        ));
    }

    // Notifier
    if config.notifier.kind == NotifierKind::Webhook {
        match config.notifier.endpoint.as_deref() {
            Some(endpoint) => {
                if let Err(e) = validate_url(endpoint) {
                    errors.push(ValidationError::new("notifier.endpoint", e));
                }
            }
            None => errors.push(ValidationError::new(
                "notifier.endpoint",
                "webhook notifier requires an endpoint",
            )),
        }
    }

    if config.notifier.timeout_ms == 0 {
        errors.push(ValidationError::new(
            "notifier.timeout_ms",
            "must be greater than 0",
        ));
    }

    // Drivers
    let mut seen = HashSet::new();
    for (idx, driver) in config.drivers.iter().enumerate() {
        let phone = driver.phone.trim();
        if phone.is_empty() {
            errors.push(ValidationError::new(
                format!("drivers[{idx}].phone"),
                "phone is required",
            ));
        } else if !seen.insert(phone) {
            errors.push(ValidationError::new(
                format!("drivers[{idx}].phone"),
                format!("duplicate driver phone '{phone}'"),
            ));
        }
    }

    errors
}

/// Validate the entire application configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let errors = collect_errors(config);
    if !errors.is_empty() {
        let error_msg = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ConfigError::ValidationError(error_msg));
    }

    Ok(())
}

/// Validate an http(s) URL
pub fn validate_url(url: &str) -> std::result::Result<(), String> {
    if url.is_empty() {
        return Err("URL cannot be empty".to_string());
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err("URL must start with http:// or https://".to_string());
    }

    Ok(())
}

fn validate_log_level(level: &str) -> std::result::Result<(), ValidationError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new(
            "server.log_level",
            format!(
                "invalid log level '{level}', must be one of: trace, debug, info, warn, error"
            ),
        )),
    }
}
