use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;

use crate::collector::MetricsCollector;

/// `/metrics` route, ready to merge into an application router
pub fn metrics_routes(collector: Arc<MetricsCollector>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(collector)
}

/// Returns Prometheus-formatted metrics
async fn metrics_handler(
    State(collector): State<Arc<MetricsCollector>>,
) -> Result<Response, MetricsHandlerError> {
    let metrics = collector
        .export_metrics()
        .map_err(|e| MetricsHandlerError::ExportError(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics,
    )
        .into_response())
}

/// Metrics handler error types
#[derive(Debug, thiserror::Error)]
pub enum MetricsHandlerError {
    #[error("failed to export metrics: {0}")]
    ExportError(String),
}

impl IntoResponse for MetricsHandlerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            MetricsHandlerError::ExportError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, message).into_response()
    }
}
