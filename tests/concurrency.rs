use async_trait::async_trait;
use futures::future::join_all;
use order_dispatch::core::{DispatchCore, RecordingSender};
use order_dispatch::ledger::{InMemoryRecordStore, RecordStore, Row, StoreError};
use order_dispatch::types::{Channel, OrderRequest, RejectReason, TransitionOutcome};
use std::sync::Arc;
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════
// MOCK IMPLEMENTATIONS FOR TESTING
// ═══════════════════════════════════════════════════════════════════════════

/// In-memory store with a remote-sized pause on every call, so a read and
/// the write that follows it are far apart in time
#[derive(Clone, Default)]
struct LaggyStore {
    inner: InMemoryRecordStore,
}

impl LaggyStore {
    async fn lag() {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[async_trait]
impl RecordStore for LaggyStore {
    async fn list_rows(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        Self::lag().await;
        self.inner.list_rows(table).await
    }

    async fn append_row(&self, table: &str, row: Row) -> Result<(), StoreError> {
        Self::lag().await;
        self.inner.append_row(table, row).await
    }

    async fn update_row(
        &self,
        table: &str,
        row_index: usize,
        start_column: usize,
        values: Row,
    ) -> Result<(), StoreError> {
        Self::lag().await;
        self.inner
            .update_row(table, row_index, start_column, values)
            .await
    }
}

fn core() -> Arc<DispatchCore> {
    Arc::new(
        DispatchCore::builder()
            .with_store(Arc::new(LaggyStore::default()))
            .with_notifier(Arc::new(RecordingSender::new()))
            .build()
            .unwrap(),
    )
}

fn request(phone: &str) -> OrderRequest {
    OrderRequest {
        name: "Ali".to_string(),
        phone: phone.to_string(),
        address: "12 Palm Street".to_string(),
        items_payload: "1x shawarma".to_string(),
        total: None,
        channel: Channel::Web,
        audio_ref: None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CLAIM RACES
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_claim_race_has_exactly_one_winner() {
    let core = core();
    let id = core.submit_order(request("0555")).await.unwrap().order.id;

    let attempts: Vec<_> = (0..20)
        .map(|i| {
            let core = core.clone();
            let id = id.clone();
            tokio::spawn(async move { core.claim_order(&id, &format!("D{i}")).await })
        })
        .collect();

    let mut winners = Vec::new();
    for attempt in attempts {
        match attempt.await.unwrap().unwrap() {
            TransitionOutcome::Accepted { order, replay } => {
                assert!(!replay);
                winners.push(order.claimed_by);
            }
            TransitionOutcome::Rejected { reason, .. } => {
                assert_eq!(reason, RejectReason::AlreadyClaimed);
            }
        }
    }

    assert_eq!(winners.len(), 1);
    let stored = core.lookup_order(&id).await.unwrap();
    assert_eq!(stored.claimed_by, winners[0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_delivery_webhooks_count_once() {
    let core = core();
    let id = core.submit_order(request("0555")).await.unwrap().order.id;
    core.claim_order(&id, "D1").await.unwrap();

    let confirmations: Vec<_> = (0..8)
        .map(|_| {
            let core = core.clone();
            let id = id.clone();
            tokio::spawn(async move { core.confirm_delivery(&id, "D1", None).await })
        })
        .collect();

    let mut fresh = 0;
    for confirmation in confirmations {
        let outcome = confirmation.await.unwrap().unwrap();
        assert!(outcome.is_accepted());
        if outcome.is_fresh() {
            fresh += 1;
        }
    }

    assert_eq!(fresh, 1);
    let driver = core.driver("D1").await.unwrap().unwrap();
    assert_eq!(driver.deliveries.lifetime, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_claims_on_different_orders_all_succeed() {
    let core = core();
    let mut ids = Vec::new();
    for n in 0..6 {
        ids.push(
            core.submit_order(request(&format!("07{n}")))
                .await
                .unwrap()
                .order
                .id,
        );
    }

    let outcomes = join_all(ids.iter().enumerate().map(|(n, id)| {
        let core = core.clone();
        let driver = format!("D{n}");
        async move { core.claim_order(id, &driver).await }
    }))
    .await;

    assert!(outcomes.into_iter().all(|o| o.unwrap().is_fresh()));
}

// ═══════════════════════════════════════════════════════════════════════════
// COUNTERS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_orders_from_one_customer_are_all_counted() {
    let core = core();

    let submissions: Vec<_> = (0..10)
        .map(|_| {
            let core = core.clone();
            tokio::spawn(async move { core.submit_order(request("0555")).await })
        })
        .collect();
    for submission in submissions {
        submission.await.unwrap().unwrap();
    }

    let customer = core.customer("0555").await.unwrap().unwrap();
    assert_eq!(customer.orders.lifetime, 10);
    assert_eq!(core.customers().await.unwrap().len(), 1);
    assert_eq!(core.list_orders().await.unwrap().len(), 10);
}
