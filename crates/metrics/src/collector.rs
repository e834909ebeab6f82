use std::time::Duration;

use order_dispatch_types::{Channel, RejectReason, TransitionOutcome};
use prometheus::{Encoder, TextEncoder};

use crate::metrics::*;

/// Records dispatch activity into the process-wide prometheus registry
#[derive(Debug, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTAKE
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_order_received(&self, channel: Channel) {
        ORDERS_RECEIVED.with_label_values(&[channel.as_str()]).inc();
    }

    pub fn record_intake_rejected(&self, channel: Channel) {
        INTAKE_REJECTED.with_label_values(&[channel.as_str()]).inc();
    }

    /// Broadcast results for one order
    pub fn record_broadcast(&self, sent: usize, failed: usize) {
        BROADCASTS
            .with_label_values(&["sent"])
            .inc_by(sent as u64);
        BROADCASTS
            .with_label_values(&["failed"])
            .inc_by(failed as u64);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_claim(&self, outcome: &TransitionOutcome) {
        CLAIMS.with_label_values(&[outcome_label(outcome)]).inc();
        self.record_rejection(outcome);
    }

    pub fn record_delivery(&self, outcome: &TransitionOutcome) {
        DELIVERIES.with_label_values(&[outcome_label(outcome)]).inc();
        self.record_rejection(outcome);
    }

    fn record_rejection(&self, outcome: &TransitionOutcome) {
        if let Some(reason) = outcome.reject_reason() {
            let label = match reason {
                RejectReason::AlreadyClaimed => "already_claimed",
                RejectReason::AlreadyDelivered => "already_delivered",
                RejectReason::AlreadyDeliveredByOther => {
                    "already_delivered_by_other"
                }
            };
            REJECTIONS.with_label_values(&[label]).inc();
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SYSTEM
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_store_unavailable(&self) {
        STORE_UNAVAILABLE.inc();
    }

    pub fn record_error_logged(&self, target: &str) {
        ERRORS_LOGGED.with_label_values(&[target]).inc();
    }

    pub fn record_operation_duration(&self, operation: &str, duration: Duration) {
        OPERATION_LATENCY
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64() * 1000.0);
    }

    /// Export all metrics in Prometheus text format
    pub fn export_metrics(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::EncodingError(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| MetricsError::EncodingError(e.to_string()))
    }
}

fn outcome_label(outcome: &TransitionOutcome) -> &'static str {
    match outcome {
        TransitionOutcome::Accepted { replay: false, .. } => "accepted",
        TransitionOutcome::Accepted { replay: true, .. } => "replay",
        TransitionOutcome::Rejected { .. } => "rejected",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("encoding error: {0}")]
    EncodingError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use order_dispatch_types::{Order, OrderId, OrderRequest};

    fn order() -> Order {
        let request = OrderRequest {
            name: "Ali".to_string(),
            phone: "0555".to_string(),
            address: "12 Palm Street".to_string(),
            items_payload: "2x falafel".to_string(),
            total: None,
            channel: Channel::Web,
            audio_ref: None,
        };
        Order::from_request(OrderId::from("o-1"), request, Default::default())
    }

    #[test]
    fn test_intake_metrics() {
        let collector = MetricsCollector::new();
        collector.record_order_received(Channel::Voice);
        collector.record_intake_rejected(Channel::Web);
        collector.record_broadcast(2, 1);

        let metrics = collector.export_metrics().unwrap();
        assert!(metrics.contains("order_dispatch_orders_received_total"));
        assert!(metrics.contains("order_dispatch_intake_rejected_total"));
        assert!(metrics.contains("order_dispatch_broadcast_notifications_total"));
    }

    #[test]
    fn test_transition_metrics() {
        let collector = MetricsCollector::new();
        collector.record_claim(&TransitionOutcome::Accepted {
            order: order(),
            replay: false,
        });
        collector.record_delivery(&TransitionOutcome::Rejected {
            order: order(),
            reason: RejectReason::AlreadyDeliveredByOther,
        });

        let metrics = collector.export_metrics().unwrap();
        assert!(metrics.contains("order_dispatch_claims_total"));
        assert!(metrics.contains("already_delivered_by_other"));
    }

    #[test]
    fn test_latency_histogram() {
        let collector = MetricsCollector::new();
        collector.record_operation_duration("claim", Duration::from_millis(12));
        collector.record_store_unavailable();

        let metrics = collector.export_metrics().unwrap();
        assert!(metrics.contains("order_dispatch_operation_latency_ms"));
        assert!(metrics.contains("order_dispatch_store_unavailable_total"));
    }
}
