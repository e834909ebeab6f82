use std::sync::Arc;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::collector::MetricsCollector;

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `log_level` applies to the dispatch
/// crates and `warn` to everything else. Error events are also counted in
/// the metrics registry.
pub fn init_tracing(
    log_level: &str,
    json: bool,
    collector: Arc<MetricsCollector>,
) -> Result<(), TracingError> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!(
            "warn,order_dispatch={log_level},order_dispatch_core={log_level},\
             order_dispatch_ledger={log_level},order_dispatch_server={log_level},\
             tower_http={log_level}"
        ))
        .map_err(|e| TracingError::InitError(e.to_string()))
    })?;

    let fmt_layer = if json {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .json()
            .boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(MetricsLayer::new(collector))
        .try_init()
        .map_err(|e| TracingError::InitError(e.to_string()))?;

    Ok(())
}

/// Tracing layer that counts error events per target
pub struct MetricsLayer {
    collector: Arc<MetricsCollector>,
}

impl MetricsLayer {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }
}

impl<S> Layer<S> for MetricsLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() == Level::ERROR {
            self.collector.record_error_logged(metadata.target());
        }
    }
}

/// Correlation ID for tracking one inbound event across components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(uuid::Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Span context for one dispatch operation
#[derive(Debug, Clone)]
pub struct OrderSpan {
    pub correlation_id: CorrelationId,
    pub operation: &'static str,
    pub order_id: Option<String>,
}

impl OrderSpan {
    pub fn new(operation: &'static str) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            operation,
            order_id: None,
        }
    }

    pub fn for_order(operation: &'static str, order_id: impl Into<String>) -> Self {
        Self {
            order_id: Some(order_id.into()),
            ..Self::new(operation)
        }
    }

    /// The tracing span; attach it to a future with `Instrument`
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "dispatch",
            correlation_id = %self.correlation_id,
            operation = self.operation,
            order_id = self.order_id.as_deref().unwrap_or(""),
        )
    }
}

/// Log an error with context as it passes through
pub trait ErrorContext {
    fn with_correlation_id(self, correlation_id: CorrelationId) -> Self;

    fn with_order_id(self, order_id: &str) -> Self;
}

impl<T, E> ErrorContext for Result<T, E>
where
    E: std::fmt::Display,
{
    fn with_correlation_id(self, correlation_id: CorrelationId) -> Self {
        self.map_err(|e| {
            tracing::error!(
                correlation_id = %correlation_id,
                error = %e,
                "error occurred"
            );
            e
        })
    }

    fn with_order_id(self, order_id: &str) -> Self {
        self.map_err(|e| {
            tracing::error!(
                order_id = %order_id,
                error = %e,
                "error occurred"
            );
            e
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("tracing initialization error: {0}")]
    InitError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_generation() {
        let id1 = CorrelationId::new();
        let id2 = CorrelationId::new();

        assert_ne!(id1, id2);
        assert_eq!(id1.as_str().len(), 36);
    }

    #[test]
    fn test_order_span() {
        let span = OrderSpan::for_order("claim", "o-1");
        assert_eq!(span.operation, "claim");
        assert_eq!(span.order_id.as_deref(), Some("o-1"));
        assert!(OrderSpan::new("intake").order_id.is_none());
    }

    #[test]
    fn test_error_context_passes_error_through() {
        let result: Result<(), String> = Err("boom".to_string());
        assert_eq!(result.with_order_id("o-1"), Err("boom".to_string()));
    }
}
