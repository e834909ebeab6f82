use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};

lazy_static! {
    // ═══════════════════════════════════════════════════════════════════════════
    // INTAKE METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Orders accepted, by intake channel
    pub static ref ORDERS_RECEIVED: IntCounterVec = register_int_counter_vec!(
        "order_dispatch_orders_received_total",
        "Total number of orders accepted",
        &["channel"]
    )
    .unwrap();

    /// Intake requests refused before anything was written
    pub static ref INTAKE_REJECTED: IntCounterVec = register_int_counter_vec!(
        "order_dispatch_intake_rejected_total",
        "Total number of intake requests rejected",
        &["channel"]
    )
    .unwrap();

    // ═══════════════════════════════════════════════════════════════════════════
    // LIFECYCLE METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Claim attempts by outcome (accepted, replay, rejected)
    pub static ref CLAIMS: IntCounterVec = register_int_counter_vec!(
        "order_dispatch_claims_total",
        "Total claim attempts by outcome",
        &["outcome"]
    )
    .unwrap();

    /// Delivery confirmations by outcome (accepted, replay, rejected)
    pub static ref DELIVERIES: IntCounterVec = register_int_counter_vec!(
        "order_dispatch_deliveries_total",
        "Total delivery confirmations by outcome",
        &["outcome"]
    )
    .unwrap();

    /// Rejected transitions by reason
    pub static ref REJECTIONS: IntCounterVec = register_int_counter_vec!(
        "order_dispatch_rejections_total",
        "Total rejected transitions by reason",
        &["reason"]
    )
    .unwrap();

    // ═══════════════════════════════════════════════════════════════════════════
    // NOTIFICATION METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Broadcast notifications by result (sent, failed)
    pub static ref BROADCASTS: IntCounterVec = register_int_counter_vec!(
        "order_dispatch_broadcast_notifications_total",
        "Total new-order notifications by result",
        &["result"]
    )
    .unwrap();

    // ═══════════════════════════════════════════════════════════════════════════
    // SYSTEM METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Requests that failed because the record store was unavailable
    pub static ref STORE_UNAVAILABLE: IntCounter = register_int_counter!(
        "order_dispatch_store_unavailable_total",
        "Total requests failed by an unavailable record store"
    )
    .unwrap();

    /// Error-level log events by target
    pub static ref ERRORS_LOGGED: IntCounterVec = register_int_counter_vec!(
        "order_dispatch_errors_logged_total",
        "Total error events logged",
        &["target"]
    )
    .unwrap();

    /// Handler latency by operation (in milliseconds)
    pub static ref OPERATION_LATENCY: HistogramVec = register_histogram_vec!(
        "order_dispatch_operation_latency_ms",
        "Operation latency in milliseconds",
        &["operation"],
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]
    )
    .unwrap();
}
