use futures::future::join_all;
use order_dispatch_ledger::{AggregateLedger, CounterUpdate, OrderLedger, RecordStore};
use order_dispatch_types::{
    Customer, Driver, MonthKey, NotifyRequest, Order, OrderId, OrderRequest, TransitionOutcome,
    DEFAULT_LOYALTY_THRESHOLD,
};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{BuilderError, DispatchError};
use crate::notify::NotificationSender;
use crate::roster::DriverRoster;

/// What intake produced for one order
#[derive(Debug, Clone)]
pub struct Submission {
    pub order: Order,
    /// `None` when the customer counters could not be written
    pub customer: Option<Customer>,
    /// Drivers the new-order broadcast reached
    pub notified: usize,
}

/// Result of a driver action together with the text the driver should get
#[derive(Debug, Clone)]
pub struct DriverReply {
    pub outcome: TransitionOutcome,
    pub driver: String,
    pub text: String,
}

// ═══════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════

/// Builder for DispatchCore
pub struct DispatchCoreBuilder {
    store: Option<Arc<dyn RecordStore>>,
    notifier: Option<Arc<dyn NotificationSender>>,
    roster: DriverRoster,
    clock: Arc<dyn Clock>,
    loyalty_threshold: u64,
}

impl DispatchCoreBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            notifier: None,
            roster: DriverRoster::default(),
            clock: Arc::new(SystemClock),
            loyalty_threshold: DEFAULT_LOYALTY_THRESHOLD,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSender>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_roster(mut self, roster: DriverRoster) -> Self {
        self.roster = roster;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_loyalty_threshold(mut self, threshold: u64) -> Self {
        self.loyalty_threshold = threshold;
        self
    }

    pub fn build(self) -> Result<DispatchCore, BuilderError> {
        let store = self.store.ok_or_else(|| BuilderError::MissingField {
            field: "store".to_string(),
        })?;
        let notifier = self.notifier.ok_or_else(|| BuilderError::MissingField {
            field: "notifier".to_string(),
        })?;

        Ok(DispatchCore {
            orders: OrderLedger::new(store.clone()),
            aggregates: AggregateLedger::with_loyalty_threshold(store, self.loyalty_threshold),
            notifier,
            roster: self.roster,
            clock: self.clock,
        })
    }
}

impl Default for DispatchCoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// DISPATCH CORE
// ═══════════════════════════════════════════════════════════════════════════

/// Sequences intake, broadcast, claim and delivery across the two ledgers.
///
/// Rejections from the order ledger are always handed back to the caller.
/// Notification failures are logged and never undo a state change.
pub struct DispatchCore {
    orders: OrderLedger,
    aggregates: AggregateLedger,
    notifier: Arc<dyn NotificationSender>,
    roster: DriverRoster,
    clock: Arc<dyn Clock>,
}

impl DispatchCore {
    pub fn builder() -> DispatchCoreBuilder {
        DispatchCoreBuilder::new()
    }

    /// Record a new order, count it for the customer and tell every driver
    pub async fn submit_order(&self, request: OrderRequest) -> Result<Submission, DispatchError> {
        let missing = request.missing_fields();
        if !missing.is_empty() {
            warn!(channel = %request.channel, ?missing, "intake rejected");
            return Err(DispatchError::missing_fields(&missing));
        }

        let order = self.orders.create(request, self.clock.now()).await?;

        let month = MonthKey::from_datetime(&order.created_at);
        let customer = match self
            .aggregates
            .record_customer_order(&order.customer_phone, &order.customer_name, month, &order.id)
            .await
        {
            Ok(CounterUpdate { record, .. }) => Some(record),
            Err(e) => {
                error!(order_id = %order.id, error = %e, "customer counters not updated");
                None
            }
        };

        let notified = self.broadcast(&order).await;
        Ok(Submission {
            order,
            customer,
            notified,
        })
    }

    /// Claim an order and tell the driver how it went
    pub async fn claim_order(
        &self,
        id: &OrderId,
        driver: &str,
    ) -> Result<TransitionOutcome, DispatchError> {
        let reply = self.claim_with_reply(id, driver).await?;
        self.send_reply(&reply).await;
        Ok(reply.outcome)
    }

    /// Claim an order, leaving the reply text for the caller to deliver
    pub async fn claim_with_reply(
        &self,
        id: &OrderId,
        driver: &str,
    ) -> Result<DriverReply, DispatchError> {
        let driver = require_driver(driver)?;
        let outcome = self.orders.claim(id, driver, self.clock.now()).await?;

        let text = match &outcome {
            TransitionOutcome::Accepted { order, .. } => claim_accepted_text(order),
            TransitionOutcome::Rejected { reason, .. } => {
                format!("Order {id} is not available: {reason}.")
            }
        };
        Ok(DriverReply {
            outcome,
            driver: driver.to_string(),
            text,
        })
    }

    /// Confirm a delivery and tell the driver how it went
    pub async fn confirm_delivery(
        &self,
        id: &OrderId,
        driver: &str,
        note: Option<String>,
    ) -> Result<TransitionOutcome, DispatchError> {
        let reply = self.confirm_delivery_with_reply(id, driver, note).await?;
        self.send_reply(&reply).await;
        Ok(reply.outcome)
    }

    /// Confirm a delivery without notifying. Driver counters move only on
    /// the first acceptance.
    pub async fn confirm_delivery_with_reply(
        &self,
        id: &OrderId,
        driver: &str,
        note: Option<String>,
    ) -> Result<DriverReply, DispatchError> {
        let driver = require_driver(driver)?;
        let outcome = self
            .orders
            .mark_delivered(id, driver, note, self.clock.now())
            .await?;

        if outcome.is_fresh() {
            let order = outcome.order();
            let delivered_at = order.delivered_at.unwrap_or(order.created_at);
            if let Err(e) = self
                .aggregates
                .record_driver_delivery(
                    driver,
                    &self.roster.name_of(driver),
                    MonthKey::from_datetime(&delivered_at),
                    id,
                )
                .await
            {
                error!(order_id = %id, driver, error = %e, "driver counters not updated");
            }
        }

        let text = match &outcome {
            TransitionOutcome::Accepted { .. } => format!("Delivery of order {id} confirmed. Thanks!"),
            TransitionOutcome::Rejected { reason, .. } => {
                format!("Cannot confirm order {id}: {reason}.")
            }
        };
        Ok(DriverReply {
            outcome,
            driver: driver.to_string(),
            text,
        })
    }

    /// Push a reply to its driver through the notifier
    pub async fn send_reply(&self, reply: &DriverReply) {
        self.notify(NotifyRequest::new(reply.driver.clone(), reply.text.clone()))
            .await;
    }

    /// Hand a claimed order back to the pool
    pub async fn release_claim(
        &self,
        id: &OrderId,
        driver: &str,
    ) -> Result<TransitionOutcome, DispatchError> {
        let driver = require_driver(driver)?;
        let outcome = self.orders.release_claim(id, driver).await?;
        if outcome.is_fresh() {
            self.broadcast(outcome.order()).await;
        }
        Ok(outcome)
    }

    /// Attach an audio reference or transcript to an order that lacks them
    pub async fn enrich_order(
        &self,
        id: &OrderId,
        audio_url: Option<String>,
        transcript: Option<String>,
    ) -> Result<Order, DispatchError> {
        Ok(self
            .orders
            .attach_enrichment(id, audio_url, transcript)
            .await?)
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>, DispatchError> {
        Ok(self.orders.list().await?)
    }

    pub async fn lookup_order(&self, id: &OrderId) -> Result<Order, DispatchError> {
        Ok(self.orders.lookup(id).await?)
    }

    pub async fn customers(&self) -> Result<Vec<Customer>, DispatchError> {
        Ok(self.aggregates.customers().await?)
    }

    pub async fn customer(&self, phone: &str) -> Result<Option<Customer>, DispatchError> {
        Ok(self.aggregates.customer(phone).await?)
    }

    pub async fn drivers(&self) -> Result<Vec<Driver>, DispatchError> {
        Ok(self.aggregates.drivers().await?)
    }

    pub async fn driver(&self, phone: &str) -> Result<Option<Driver>, DispatchError> {
        Ok(self.aggregates.driver(phone).await?)
    }

    pub fn roster(&self) -> &DriverRoster {
        &self.roster
    }

    /// Tell every rostered driver about an open order. Returns how many
    /// notifications went through.
    async fn broadcast(&self, order: &Order) -> usize {
        let text = new_order_text(order);
        let sends = self.roster.drivers().iter().map(|driver| {
            let request = NotifyRequest::new(driver.phone.clone(), text.clone());
            async move {
                match self.notifier.send(&request).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(
                            order_id = %order.id,
                            driver = %request.to_phone,
                            error = %e,
                            "broadcast failed"
                        );
                        false
                    }
                }
            }
        });

        let delivered = join_all(sends).await.into_iter().filter(|ok| *ok).count();
        info!(
            order_id = %order.id,
            notified = delivered,
            roster = self.roster.len(),
            "order broadcast"
        );
        delivered
    }

    async fn notify(&self, request: NotifyRequest) {
        if let Err(e) = self.notifier.send(&request).await {
            warn!(to = %request.to_phone, error = %e, "notification failed");
        }
    }
}

fn require_driver(driver: &str) -> Result<&str, DispatchError> {
    let driver = driver.trim();
    if driver.is_empty() {
        return Err(DispatchError::missing_fields(&["driver"]));
    }
    Ok(driver)
}

fn new_order_text(order: &Order) -> String {
    let place = if order.address.is_empty() {
        "address by phone".to_string()
    } else {
        order.address.clone()
    };
    format!(
        "New order {}: {} ({}). Reply \"claim {}\" to take it.",
        order.id, order.customer_name, place, order.id
    )
}

fn claim_accepted_text(order: &Order) -> String {
    format!(
        "Order {} is yours. Customer {} {}. Reply \"delivered {}\" when done.",
        order.id, order.customer_name, order.customer_phone, order.id
    )
}
