use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use order_dispatch::core::{Clock, DispatchCore, DispatchError, ManualClock, RecordingSender};
use order_dispatch::core::{DriverContact, DriverRoster};
use order_dispatch::ledger::{
    InMemoryRecordStore, RecordStore, RetryPolicy, RetryingStore, Row, StoreError,
    CUSTOMERS_TABLE, ORDERS_TABLE,
};
use order_dispatch::types::{
    Channel, LoyaltyTier, MonthKey, OrderId, OrderRequest, OrderStatus, RejectReason, TransitionOutcome,
};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════════
// MOCK IMPLEMENTATIONS FOR TESTING
// ═══════════════════════════════════════════════════════════════════════════

/// Store whose writes to one table always fail
struct BrokenTableStore {
    inner: InMemoryRecordStore,
    broken: &'static str,
}

#[async_trait]
impl RecordStore for BrokenTableStore {
    async fn list_rows(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        self.inner.list_rows(table).await
    }

    async fn append_row(&self, table: &str, row: Row) -> Result<(), StoreError> {
        if table == self.broken {
            return Err(StoreError::DatabaseError("quota exceeded".to_string()));
        }
        self.inner.append_row(table, row).await
    }

    async fn update_row(
        &self,
        table: &str,
        row_index: usize,
        start_column: usize,
        values: Row,
    ) -> Result<(), StoreError> {
        if table == self.broken {
            return Err(StoreError::DatabaseError("quota exceeded".to_string()));
        }
        self.inner
            .update_row(table, row_index, start_column, values)
            .await
    }
}

/// Store whose first few reads time out
struct SlowStartStore {
    inner: InMemoryRecordStore,
    failures_left: AtomicU32,
}

#[async_trait]
impl RecordStore for SlowStartStore {
    async fn list_rows(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::ConnectionError("timed out".to_string()));
        }
        self.inner.list_rows(table).await
    }

    async fn append_row(&self, table: &str, row: Row) -> Result<(), StoreError> {
        self.inner.append_row(table, row).await
    }

    async fn update_row(
        &self,
        table: &str,
        row_index: usize,
        start_column: usize,
        values: Row,
    ) -> Result<(), StoreError> {
        self.inner
            .update_row(table, row_index, start_column, values)
            .await
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════

struct Harness {
    core: DispatchCore,
    store: InMemoryRecordStore,
    notifier: Arc<RecordingSender>,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    let store = InMemoryRecordStore::new();
    let notifier = Arc::new(RecordingSender::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap(),
    ));
    let core = DispatchCore::builder()
        .with_store(Arc::new(store.clone()))
        .with_notifier(notifier.clone())
        .with_roster(DriverRoster::new([
            DriverContact::new("D1", "Sami"),
            DriverContact::new("D2", "Lina"),
        ]))
        .with_clock(clock.clone())
        .with_loyalty_threshold(5)
        .build()
        .unwrap();

    Harness {
        core,
        store,
        notifier,
        clock,
    }
}

fn ali_order() -> OrderRequest {
    OrderRequest {
        name: "Ali".to_string(),
        phone: "0555".to_string(),
        address: "12 Palm Street".to_string(),
        items_payload: "2x falafel wrap".to_string(),
        total: Some(Decimal::from_str("18.50").unwrap()),
        channel: Channel::Web,
        audio_ref: None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// END-TO-END
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_order_claim_and_delivery_scenario() {
    let h = harness();

    let submission = h.core.submit_order(ali_order()).await.unwrap();
    let order_id = submission.order.id.clone();
    assert_eq!(submission.order.status, OrderStatus::New);
    assert_eq!(submission.notified, 2);

    let customer = submission.customer.expect("customer counters written");
    assert_eq!(customer.phone, "0555");
    assert_eq!(customer.orders.lifetime, 1);
    assert_eq!(customer.orders.current_month, 1);

    let claim = h.core.claim_order(&order_id, "D1").await.unwrap();
    assert!(claim.is_fresh());
    assert_eq!(claim.order().status, OrderStatus::Claimed);

    let lost = h.core.claim_order(&order_id, "D2").await.unwrap();
    assert_eq!(lost.reject_reason(), Some(RejectReason::AlreadyClaimed));

    h.clock.advance(Duration::minutes(25));
    let delivered = h
        .core
        .confirm_delivery(&order_id, "D1", Some("handed to Ali".to_string()))
        .await
        .unwrap();
    assert!(delivered.is_fresh());
    assert_eq!(delivered.order().status, OrderStatus::Delivered);
    assert_eq!(delivered.order().delivery_driver_phone.as_deref(), Some("D1"));

    let driver = h.core.driver("D1").await.unwrap().unwrap();
    assert_eq!(driver.name, "Sami");
    assert_eq!(driver.deliveries.lifetime, 1);
    assert!(h.core.driver("D2").await.unwrap().is_none());

    // Every rostered driver heard about the order; the loser was told why
    assert!(h.notifier.sent_to("D2").iter().any(|t| t.contains("not available")));
    assert!(h.notifier.sent_to("D1").iter().any(|t| t.contains("confirmed")));
}

#[tokio::test]
async fn test_lookup_reflects_lifecycle() {
    let h = harness();
    let id = h.core.submit_order(ali_order()).await.unwrap().order.id;

    h.core.claim_order(&id, "D2").await.unwrap();
    let order = h.core.lookup_order(&id).await.unwrap();
    assert_eq!(order.claimed_by.as_deref(), Some("D2"));
    assert_eq!(order.claimed_at, Some(h.clock.now()));

    let listed = h.core.list_orders().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0], order);
}

// ═══════════════════════════════════════════════════════════════════════════
// IDEMPOTENCE AND CONFLICTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_reclaim_by_holder_keeps_claim_time() {
    let h = harness();
    let id = h.core.submit_order(ali_order()).await.unwrap().order.id;

    let first = h.core.claim_order(&id, "D1").await.unwrap();
    h.clock.advance(Duration::minutes(3));
    let again = h.core.claim_order(&id, "D1").await.unwrap();

    assert!(matches!(again, TransitionOutcome::Accepted { replay: true, .. }));
    assert_eq!(again.order().claimed_at, first.order().claimed_at);
}

#[tokio::test]
async fn test_repeated_delivery_counts_once() {
    let h = harness();
    let id = h.core.submit_order(ali_order()).await.unwrap().order.id;

    h.core.claim_order(&id, "D1").await.unwrap();
    let first = h.core.confirm_delivery(&id, "D1", None).await.unwrap();
    let second = h.core.confirm_delivery(&id, "D1", None).await.unwrap();

    assert!(first.is_fresh());
    assert!(matches!(second, TransitionOutcome::Accepted { replay: true, .. }));
    assert_eq!(h.core.driver("D1").await.unwrap().unwrap().deliveries.lifetime, 1);
}

#[tokio::test]
async fn test_delivery_by_driver_other_than_claimer_is_accepted() {
    let h = harness();
    let id = h.core.submit_order(ali_order()).await.unwrap().order.id;

    h.core.claim_order(&id, "D1").await.unwrap();
    h.clock.advance(Duration::minutes(30));
    let delivered = h.core.confirm_delivery(&id, "D2", None).await.unwrap();

    assert!(delivered.is_fresh());
    let order = h.core.lookup_order(&id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);
    assert_eq!(order.claimed_by.as_deref(), Some("D2"));
    assert_eq!(order.delivery_driver_phone.as_deref(), Some("D2"));

    // Only the driver who delivered is credited
    let lina = h.core.driver("D2").await.unwrap().unwrap();
    assert_eq!(lina.name, "Lina");
    assert_eq!(lina.deliveries.lifetime, 1);
    assert!(h.core.driver("D1").await.unwrap().is_none());

    let replay = h.core.confirm_delivery(&id, "D2", None).await.unwrap();
    assert!(replay.is_accepted() && !replay.is_fresh());
    assert_eq!(h.core.driver("D2").await.unwrap().unwrap().deliveries.lifetime, 1);
}

#[tokio::test]
async fn test_delivery_after_other_driver_delivered_is_rejected() {
    let h = harness();
    let id = h.core.submit_order(ali_order()).await.unwrap().order.id;

    h.core.confirm_delivery(&id, "D1", None).await.unwrap();
    let other = h.core.confirm_delivery(&id, "D2", None).await.unwrap();

    assert_eq!(
        other.reject_reason(),
        Some(RejectReason::AlreadyDeliveredByOther)
    );
    assert!(h.core.driver("D2").await.unwrap().is_none());

    let late_claim = h.core.claim_order(&id, "D2").await.unwrap();
    assert_eq!(late_claim.reject_reason(), Some(RejectReason::AlreadyDelivered));
}

#[tokio::test]
async fn test_release_puts_order_back_in_pool() {
    let h = harness();
    let id = h.core.submit_order(ali_order()).await.unwrap().order.id;

    h.core.claim_order(&id, "D1").await.unwrap();
    let stolen = h.core.release_claim(&id, "D2").await.unwrap();
    assert_eq!(stolen.reject_reason(), Some(RejectReason::AlreadyClaimed));

    let released = h.core.release_claim(&id, "D1").await.unwrap();
    assert!(released.is_fresh());
    assert_eq!(released.order().status, OrderStatus::New);

    let claim = h.core.claim_order(&id, "D2").await.unwrap();
    assert!(claim.is_fresh());
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let h = harness();
    let err = h
        .core
        .claim_order(&OrderId::from("missing"), "D1")
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::NotFound(_)));
}

#[tokio::test]
async fn test_malformed_order_writes_nothing() {
    let h = harness();
    let mut request = ali_order();
    request.address = "  ".to_string();

    let err = h.core.submit_order(request).await.unwrap_err();
    assert!(matches!(err, DispatchError::MalformedRequest(_)));
    assert_eq!(h.store.row_count(ORDERS_TABLE), 0);
    assert_eq!(h.store.row_count(CUSTOMERS_TABLE), 0);
    assert!(h.notifier.sent().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// MONTHLY AGGREGATES
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_customer_counter_rolls_over_with_month() {
    let h = harness();
    for _ in 0..3 {
        h.core.submit_order(ali_order()).await.unwrap();
    }
    let may = h.core.customer("0555").await.unwrap().unwrap();
    assert_eq!(may.orders.current_month, 3);
    assert_eq!(may.orders.last_active_month, MonthKey::new(2024, 5).unwrap());

    h.clock
        .set(Utc.with_ymd_and_hms(2024, 6, 1, 0, 30, 0).unwrap());
    let june = h
        .core
        .submit_order(ali_order())
        .await
        .unwrap()
        .customer
        .unwrap();

    assert_eq!(june.orders.current_month, 1);
    assert_eq!(june.orders.lifetime, 4);
    assert_eq!(june.orders.last_active_month.as_str(), "2024-06");
}

#[tokio::test]
async fn test_loyalty_reached_on_threshold_order() {
    let h = harness();
    for n in 1..=5u64 {
        let customer = h
            .core
            .submit_order(ali_order())
            .await
            .unwrap()
            .customer
            .unwrap();
        let expected = if n < 5 {
            LoyaltyTier::Regular
        } else {
            LoyaltyTier::Loyal
        };
        assert_eq!(customer.loyalty_tier, expected, "after order {n}");
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// STORE FAILURES
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_counter_failure_keeps_the_order() {
    let store = Arc::new(BrokenTableStore {
        inner: InMemoryRecordStore::new(),
        broken: CUSTOMERS_TABLE,
    });
    let core = DispatchCore::builder()
        .with_store(store.clone())
        .with_notifier(Arc::new(RecordingSender::new()))
        .build()
        .unwrap();

    let submission = core.submit_order(ali_order()).await.unwrap();
    assert!(submission.customer.is_none());
    assert_eq!(store.inner.row_count(ORDERS_TABLE), 1);
    assert_eq!(
        core.lookup_order(&submission.order.id).await.unwrap().status,
        OrderStatus::New
    );
}

#[tokio::test]
async fn test_transient_read_failures_are_retried() {
    let flaky = SlowStartStore {
        inner: InMemoryRecordStore::new(),
        failures_left: AtomicU32::new(2),
    };
    let policy = RetryPolicy {
        max_attempts: 3,
        initial_delay: std::time::Duration::from_millis(1),
        max_delay: std::time::Duration::from_millis(2),
    };
    let core = DispatchCore::builder()
        .with_store(Arc::new(RetryingStore::new(flaky, policy)))
        .with_notifier(Arc::new(RecordingSender::new()))
        .build()
        .unwrap();

    assert!(core.list_orders().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_read_failures_past_the_budget_surface_as_unavailable() {
    let flaky = SlowStartStore {
        inner: InMemoryRecordStore::new(),
        failures_left: AtomicU32::new(10),
    };
    let policy = RetryPolicy {
        max_attempts: 2,
        initial_delay: std::time::Duration::from_millis(1),
        max_delay: std::time::Duration::from_millis(1),
    };
    let core = DispatchCore::builder()
        .with_store(Arc::new(RetryingStore::new(flaky, policy)))
        .with_notifier(Arc::new(RecordingSender::new()))
        .build()
        .unwrap();

    let err = core.list_orders().await.unwrap_err();
    assert!(matches!(err, DispatchError::StoreUnavailable(_)));
}
