//! Metrics and logging for the order dispatch service
//!
//! - Prometheus counters for intake, claims, deliveries and broadcasts
//! - `/metrics` route for scraping
//! - Tracing setup with correlation ids and per-order spans

pub mod collector;
pub mod http;
pub mod metrics;
pub mod tracing;

pub use collector::{MetricsCollector, MetricsError};
pub use http::metrics_routes;
pub use self::tracing::{init_tracing, CorrelationId, ErrorContext, OrderSpan, TracingError};
